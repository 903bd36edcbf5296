use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    #[error("nil pointer dereference")]
    NilDereference,
    #[error("interface conversion: interface is {from}, not {to}")]
    InterfaceConversion { from: String, to: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index out of range [{index}] with length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("send on closed channel")]
    SendOnClosedChannel,
    #[error("close of closed channel")]
    CloseOfClosedChannel,
    #[error("operation on nil channel")]
    NilChannel,
    #[error("invalid operation on {dir} channel")]
    ChannelDirection { dir: &'static str },
    #[error("assignment to entry in nil map")]
    NilMapAssignment,
    #[error("call of nil function")]
    NilFunctionCall,
    #[error("{kind} outside an enclosing context")]
    StrayFlow { kind: &'static str },
    #[error("not implemented: {feature}")]
    Unimplemented { feature: String },
    #[error("{message}")]
    Panic { message: String },
}

impl RuntimeError {
    pub fn unimplemented(feature: impl Into<String>) -> Self {
        RuntimeError::Unimplemented {
            feature: feature.into(),
        }
    }

    pub fn panic(message: impl Into<String>) -> Self {
        RuntimeError::Panic {
            message: message.into(),
        }
    }
}
