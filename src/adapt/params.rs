use crate::error::AdaptError;

use json::JsonValue;
use std::fs::read_to_string;

/// Minimal relative change between consecutive element errors for [Strategy::ProcessedFraction] to stop
pub const STRATEGY_0_REL_CHANGE: f64 = 1e-3;
/// Previous element error assumed by [Strategy::ProcessedFraction] before any element has been accepted
pub const STRATEGY_0_INITIAL_PREV_ERROR: f64 = 1000.0;
/// Multiple of `to_be_processed` after which [Strategy::RelativeOrBudget] stops
pub const STRATEGY_3_BUDGET_FACTOR: f64 = 1.5;

/// Stopping criteria for the adaptivity loop. Only elements taken from the regular queue are tested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// (code 0) stop once the processed error exceeds `sqrt(thr)` times the total and the error changes noticeably
    ProcessedFraction,
    /// (code 1) stop at the first element whose error is below `thr` times the largest element error
    RelativeToFirst,
    /// (code 2) stop at the first element whose error is below `thr`
    Absolute,
    /// (code 3) like code 1, but also stop once `1.5 * to_be_processed` error has been processed
    RelativeOrBudget,
}

impl Strategy {
    pub fn from_code(code: i32) -> Result<Self, AdaptError> {
        match code {
            0 => Ok(Self::ProcessedFraction),
            1 => Ok(Self::RelativeToFirst),
            2 => Ok(Self::Absolute),
            3 => Ok(Self::RelativeOrBudget),
            _ => Err(AdaptError::UnknownStrategy(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::ProcessedFraction => 0,
            Self::RelativeToFirst => 1,
            Self::Absolute => 2,
            Self::RelativeOrBudget => 3,
        }
    }
}

pub const TOTAL_ERROR_REL: u32 = 0x00;
pub const TOTAL_ERROR_ABS: u32 = 0x01;
pub const ELEMENT_ERROR_REL: u32 = 0x00;
pub const ELEMENT_ERROR_ABS: u32 = 0x10;
pub const TOTAL_ERROR_MASK: u32 = 0x0F;
pub const ELEMENT_ERROR_MASK: u32 = 0xF0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorNormalization {
    /// raw squared error
    Absolute,
    /// squared error divided by the squared norm of the reference solution
    Relative,
}

/// How total and per-element errors are normalized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorFlags {
    pub total: ErrorNormalization,
    pub element: ErrorNormalization,
}

impl ErrorFlags {
    pub const fn new(total: ErrorNormalization, element: ErrorNormalization) -> Self {
        Self { total, element }
    }

    /// Decode a combination of the `*_ERROR_*` bit codes
    pub fn from_bits(bits: u32) -> Result<Self, AdaptError> {
        let total = match bits & TOTAL_ERROR_MASK {
            TOTAL_ERROR_REL => ErrorNormalization::Relative,
            TOTAL_ERROR_ABS => ErrorNormalization::Absolute,
            _ => return Err(AdaptError::UnknownErrorFlags(bits)),
        };
        let element = match bits & ELEMENT_ERROR_MASK {
            ELEMENT_ERROR_REL => ErrorNormalization::Relative,
            ELEMENT_ERROR_ABS => ErrorNormalization::Absolute,
            _ => return Err(AdaptError::UnknownErrorFlags(bits)),
        };
        if bits & !(TOTAL_ERROR_MASK | ELEMENT_ERROR_MASK) != 0 {
            return Err(AdaptError::UnknownErrorFlags(bits));
        }

        Ok(Self { total, element })
    }

    pub fn bits(&self) -> u32 {
        let total = match self.total {
            ErrorNormalization::Relative => TOTAL_ERROR_REL,
            ErrorNormalization::Absolute => TOTAL_ERROR_ABS,
        };
        let element = match self.element {
            ErrorNormalization::Relative => ELEMENT_ERROR_REL,
            ErrorNormalization::Absolute => ELEMENT_ERROR_ABS,
        };
        total | element
    }
}

impl Default for ErrorFlags {
    fn default() -> Self {
        Self::new(ErrorNormalization::Relative, ErrorNormalization::Relative)
    }
}

/// Parameters of a single adaptivity step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptParams {
    /// Threshold used by the stopping [Strategy] (and by h-Unrefinement)
    pub threshold: f64,
    pub strategy: Strategy,
    /// Maximum refinement level difference between neighboring elements after the step (`None` disables regularization)
    pub regularize: Option<usize>,
    /// Error budget used by [Strategy::RelativeOrBudget]
    pub to_be_processed: f64,
}

impl Default for AdaptParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            strategy: Strategy::ProcessedFraction,
            regularize: None,
            to_be_processed: 0.0,
        }
    }
}

impl AdaptParams {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Parse parameters from a JSON object. Missing keys keep their default values.
    ///
    /// ```JSON
    /// {
    ///     "threshold": 0.3,
    ///     "strategy": 0,
    ///     "regularize": 1,
    ///     "to_be_processed": 0.0
    /// }
    /// ```
    /// A negative (or null) `regularize` disables regularization.
    pub fn from_json(params_json: &JsonValue) -> Result<Self, AdaptError> {
        if !params_json.is_object() {
            return Err(AdaptError::Config(String::from(
                "adaptivity parameters must be a JSON object",
            )));
        }

        let mut params = Self::default();

        if !params_json["threshold"].is_null() {
            params.threshold = params_json["threshold"]
                .as_f64()
                .filter(|thr| thr.is_finite() && *thr >= 0.0)
                .ok_or_else(|| {
                    AdaptError::Config(String::from("threshold must be a non-negative number"))
                })?;
        }

        if !params_json["strategy"].is_null() {
            let code = params_json["strategy"]
                .as_i32()
                .ok_or_else(|| AdaptError::Config(String::from("strategy must be an integer")))?;
            params.strategy = Strategy::from_code(code)?;
        }

        if !params_json["regularize"].is_null() {
            let level = params_json["regularize"]
                .as_i64()
                .ok_or_else(|| AdaptError::Config(String::from("regularize must be an integer")))?;
            params.regularize = usize::try_from(level).ok();
        }

        if !params_json["to_be_processed"].is_null() {
            params.to_be_processed = params_json["to_be_processed"]
                .as_f64()
                .ok_or_else(|| {
                    AdaptError::Config(String::from("to_be_processed must be a number"))
                })?;
        }

        Ok(params)
    }

    /// Parse parameters from a JSON file (see [from_json](Self::from_json))
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, AdaptError> {
        let contents = read_to_string(path.as_ref())?;
        let params_json =
            json::parse(&contents).map_err(|err| AdaptError::Config(err.to_string()))?;
        Self::from_json(&params_json)
    }
}
