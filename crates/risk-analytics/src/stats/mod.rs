//! Statistical testing.
//!
//! - [`hypothesis`]: Welch t-test, chi-squared independence test and the
//!   standard claim-risk test battery

pub mod hypothesis;

pub use hypothesis::{
    ChiSquaredOutcome, HypothesisSuite, WelchOutcome, chi_squared_independence, chi_squared_test,
    t_test_groups, welch_t_test,
};
