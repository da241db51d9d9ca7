use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Input errors raised by the threshold-pivoted fitter.
///
/// Convergence problems and malformed bounds are not errors; they are carried
/// in `PivotFit::success` / `PivotFit::message`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("No data points with x >= {threshold}")]
    NoDataAboveThreshold { threshold: f64 },
    #[error("x and y must have the same length (got {x_len} and {y_len})")]
    LengthMismatch { x_len: usize, y_len: usize },
}

impl From<FitError> for AppError {
    fn from(value: FitError) -> Self {
        AppError::new(3, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_maps_to_no_data_exit_code() {
        let err: AppError = FitError::NoDataAboveThreshold { threshold: 80.0 }.into();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "No data points with x >= 80");
    }
}
