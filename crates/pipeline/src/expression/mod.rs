//! 표현식 평가
//!
//! [`Expression`]은 컴파일된 평가 트리입니다. 정의 파일에서 읽은
//! [`ExpressionSource`]를 [`FunctionRegistry`](crate::function::FunctionRegistry)로
//! 컴파일해 만듭니다. 함수 참조는 컴파일 시점에 해석되므로 평가 중에는
//! 이름 조회가 없습니다.
//!
//! 평가 결과 `None`은 null입니다. 조건 위치에서 null은 `false`로 취급됩니다.

mod source;

pub use source::{CallArgs, ExpressionSource, ScalarLiteral};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs};

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// 산술 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithmeticOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// 함수 호출 노드
///
/// `args`는 함수 파라미터 선언 순서와 같은 길이입니다. 생략된 인자는 `None`.
#[derive(Clone)]
pub struct FunctionCall {
    function: Arc<dyn Function>,
    args: Vec<Option<Expression>>,
}

impl FunctionCall {
    pub fn new(function: Arc<dyn Function>, args: Vec<Option<Expression>>) -> Self {
        Self { function, args }
    }

    pub fn name(&self) -> &str {
        &self.function.descriptor().name
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Option<Value>, EvalError> {
        let descriptor = self.function.descriptor();
        let mut args = FunctionArgs::new(descriptor.name.clone());

        for (index, param) in descriptor.params.iter().enumerate() {
            let evaluated = match self.args.get(index) {
                Some(Some(expr)) => expr.evaluate(ctx)?,
                _ => None,
            };
            match evaluated.or_else(|| param.default.clone()) {
                Some(value) => {
                    if !param.kind.accepts(&value) {
                        return Err(EvalError::TypeMismatch {
                            function: descriptor.name.clone(),
                            param: param.name.clone(),
                            expected: param.kind,
                            actual: value.kind(),
                        });
                    }
                    args.insert(param.name.clone(), value);
                }
                None if !param.optional => {
                    return Err(EvalError::MissingArgument {
                        function: descriptor.name.clone(),
                        param: param.name.clone(),
                    });
                }
                None => {}
            }
        }

        self.function.invoke(&args, ctx)
    }

    fn is_pure(&self) -> bool {
        self.function.descriptor().pure && self.args.iter().flatten().all(Expression::is_pure)
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function", &self.name())
            .field("args", &self.args)
            .finish()
    }
}

/// 컴파일된 표현식
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Field(String),
    Not(Box<Expression>),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call(FunctionCall),
}

impl Expression {
    /// 표현식을 평가합니다.
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Option<Value>, EvalError> {
        match self {
            Self::Literal(value) => Ok(Some(value.clone())),
            Self::Field(name) => Ok(ctx.message().field(name).cloned()),
            Self::Not(inner) => Ok(Some(Value::Bool(!inner.evaluate_bool(ctx)?))),
            Self::And(operands) => {
                for operand in operands {
                    if !operand.evaluate_bool(ctx)? {
                        return Ok(Some(Value::Bool(false)));
                    }
                }
                Ok(Some(Value::Bool(true)))
            }
            Self::Or(operands) => {
                for operand in operands {
                    if operand.evaluate_bool(ctx)? {
                        return Ok(Some(Value::Bool(true)));
                    }
                }
                Ok(Some(Value::Bool(false)))
            }
            Self::Comparison { op, left, right } => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                compare(*op, left.as_ref(), right.as_ref()).map(|b| Some(Value::Bool(b)))
            }
            Self::Arithmetic { op, left, right } => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                arithmetic(*op, left.as_ref(), right.as_ref()).map(Some)
            }
            Self::Call(call) => call.evaluate(ctx),
        }
    }

    /// 조건으로 평가합니다. null은 `false`, 불리언이 아닌 값은 에러입니다.
    pub fn evaluate_bool(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvalError> {
        match self.evaluate(ctx)? {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(EvalError::NotBoolean {
                actual: other.kind(),
            }),
        }
    }

    /// 메시지를 변경하거나 메시지를 합성하지 않는 표현식인지 여부
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Field(_) => true,
            Self::Not(inner) => inner.is_pure(),
            Self::And(operands) | Self::Or(operands) => operands.iter().all(Self::is_pure),
            Self::Comparison { left, right, .. } | Self::Arithmetic { left, right, .. } => {
                left.is_pure() && right.is_pure()
            }
            Self::Call(call) => call.is_pure(),
        }
    }
}

fn compare(op: ComparisonOp, left: Option<&Value>, right: Option<&Value>) -> Result<bool, EvalError> {
    match op {
        ComparisonOp::Eq => Ok(left == right),
        ComparisonOp::Ne => Ok(left != right),
        ComparisonOp::Lt => ordered(op, left, right, Ordering::is_lt),
        ComparisonOp::Le => ordered(op, left, right, Ordering::is_le),
        ComparisonOp::Gt => ordered(op, left, right, Ordering::is_gt),
        ComparisonOp::Ge => ordered(op, left, right, Ordering::is_ge),
    }
}

/// 순서 비교. 한쪽이라도 null이면 `false`입니다.
fn ordered(
    op: ComparisonOp,
    left: Option<&Value>,
    right: Option<&Value>,
    accept: fn(Ordering) -> bool,
) -> Result<bool, EvalError> {
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(false);
    };
    order(left, right)
        .map(accept)
        .ok_or_else(|| EvalError::InvalidOperand {
            operator: op.as_str(),
            reason: format!("cannot order {} and {}", left.kind(), right.kind()),
        })
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
        (a, b) if a.is_number() && b.is_number() => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn arithmetic(op: ArithmeticOp, left: Option<&Value>, right: Option<&Value>) -> Result<Value, EvalError> {
    let invalid = |reason: String| EvalError::InvalidOperand {
        operator: op.as_str(),
        reason,
    };

    let (Some(left), Some(right)) = (left, right) else {
        return Err(invalid("null operand".to_owned()));
    };

    match (left, right) {
        (Value::String(a), b) if op == ArithmeticOp::Add => Ok(Value::String(format!("{a}{b}"))),
        (Value::Long(a), Value::Long(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                ArithmeticOp::Add => a.checked_add(b),
                ArithmeticOp::Sub => a.checked_sub(b),
                ArithmeticOp::Mul => a.checked_mul(b),
                ArithmeticOp::Div | ArithmeticOp::Rem if b == 0 => {
                    return Err(invalid("division by zero".to_owned()));
                }
                ArithmeticOp::Div => a.checked_div(b),
                ArithmeticOp::Rem => a.checked_rem(b),
            };
            result
                .map(Value::Long)
                .ok_or_else(|| invalid("integer overflow".to_owned()))
        }
        (a, b) if a.is_number() && b.is_number() => {
            let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                return Err(invalid("non-numeric operand".to_owned()));
            };
            if matches!(op, ArithmeticOp::Div | ArithmeticOp::Rem) && b == 0.0 {
                return Err(invalid("division by zero".to_owned()));
            }
            Ok(Value::Double(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Sub => a - b,
                ArithmeticOp::Mul => a * b,
                ArithmeticOp::Div => a / b,
                ArithmeticOp::Rem => a % b,
            }))
        }
        (a, b) => Err(invalid(format!("unsupported operands {} and {}", a.kind(), b.kind()))),
    }
}
