//! Error macros for llm-eval

/// Macro for returning configuration errors
#[macro_export]
macro_rules! bail_config {
    ($($arg:tt)*) => {
        return Err($crate::error::EvalError::config(format!($($arg)*)))
    };
}

/// Macro for mapping ledger write failures
#[macro_export]
macro_rules! map_ledger_err {
    ($model_id:expr, $error:expr) => {
        $crate::error::EvalError::ledger_write($model_id, $error)
    };
}
