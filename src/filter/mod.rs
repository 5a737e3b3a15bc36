//! Gene filtering ahead of distance computation

mod expression;

pub use expression::{
    filter_expressed, threshold_for_count, FilterMask, FilterOutcome, FilterParams,
};
