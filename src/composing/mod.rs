//! Composition models
//!
//! This module contains the residual stack, which chains two rating models: the second model is
//! trained on the errors the first one leaves behind and both predictions are summed.
mod residual_stack;

pub use residual_stack::{residuals, ResidualStack, ResidualStackError};
