//! Model evaluation metrics.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Digits used when rendering the classification report.
pub const REPORT_DIGITS: usize = 3;

fn check_lengths(y_true: usize, y_pred: usize) -> Result<()> {
    if y_true != y_pred {
        return Err(RiskError::LengthMismatch {
            left: "y_true".to_string(),
            left_len: y_true,
            right: "y_pred".to_string(),
            right_len: y_pred,
        });
    }
    if y_true == 0 {
        return Err(RiskError::InvalidInput("cannot evaluate on an empty test set".to_string()));
    }
    Ok(())
}

/// Regression quality on a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// RMSE and coefficient of determination.
    ///
    /// With a constant target, R² is 1 for a perfect fit and 0 otherwise.
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;

        let n = y_true.len() as f64;
        let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(Self {
            rmse: (ss_res / n).sqrt(),
            r2,
        })
    }
}

/// Precision, recall and F1 for one class (or an average of classes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class table in the layout of the usual text classification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Classes present in either the truth or the predictions.
    pub classes: Vec<ClassReport>,
    pub accuracy: f64,
    pub macro_avg: ClassReport,
    pub weighted_avg: ClassReport,
}

impl ClassificationReport {
    pub fn compute(y_true: &[bool], y_pred: &[bool]) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;

        let classes: Vec<ClassReport> = [false, true]
            .into_iter()
            .filter(|c| y_true.contains(c) || y_pred.contains(c))
            .map(|c| class_report(y_true, y_pred, c))
            .collect();

        let total = y_true.len();
        let count = classes.len() as f64;
        let macro_avg = ClassReport {
            label: "macro avg".to_string(),
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / count,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / count,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / count,
            support: total,
        };

        let weight = |c: &ClassReport| c.support as f64 / total as f64;
        let weighted_avg = ClassReport {
            label: "weighted avg".to_string(),
            precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
            recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
            f1: classes.iter().map(|c| c.f1 * weight(c)).sum(),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        })
    }

    /// Fixed-width text table with `digits` decimals.
    pub fn render(&self, digits: usize) -> String {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain([self.weighted_avg.label.len(), digits])
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        let _ = write!(out, "{:>width$} ", "");
        for header in ["precision", "recall", "f1-score", "support"] {
            let _ = write!(out, " {header:>9}");
        }
        out.push_str("\n\n");

        let row = |out: &mut String, c: &ClassReport| {
            let _ = writeln!(
                out,
                "{:>width$}  {:>9.digits$} {:>9.digits$} {:>9.digits$} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            );
        };

        for class in &self.classes {
            row(&mut out, class);
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>width$}  {:>9} {:>9} {:>9.digits$} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        );
        row(&mut out, &self.macro_avg);
        row(&mut out, &self.weighted_avg);
        out
    }
}

fn class_report(y_true: &[bool], y_pred: &[bool], class: bool) -> ClassReport {
    let true_positive = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| **t == class && **p == class)
        .count() as f64;
    let predicted = y_pred.iter().filter(|p| **p == class).count() as f64;
    let support = y_true.iter().filter(|t| **t == class).count();

    let precision = if predicted > 0.0 { true_positive / predicted } else { 0.0 };
    let recall = if support > 0 { true_positive / support as f64 } else { 0.0 };

    ClassReport {
        label: u8::from(class).to_string(),
        precision,
        recall,
        f1: f1(precision, recall),
        support,
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

fn accuracy(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Classification quality on a held-out set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// F1 of the claim (positive) class; 0 when undefined.
    pub f1: f64,
    pub report: ClassificationReport,
    /// `report` rendered as text.
    pub report_text: String,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[bool], y_pred: &[bool]) -> Result<Self> {
        let report = ClassificationReport::compute(y_true, y_pred)?;
        let positive = class_report(y_true, y_pred, true);

        Ok(Self {
            accuracy: report.accuracy,
            f1: positive.f1,
            report_text: report.render(REPORT_DIGITS),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_regression_metrics() {
        let m = RegressionMetrics::compute(&[3.0, -0.5, 2.0, 7.0], &[2.5, 0.0, 2.0, 8.0]).unwrap();
        assert_relative_eq!(m.rmse, (0.375f64).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(m.r2, 0.9486081370449679, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(RegressionMetrics::compute(&[2.0, 2.0], &[2.0, 2.0]).unwrap().r2, 1.0);
        assert_eq!(RegressionMetrics::compute(&[2.0, 2.0], &[1.0, 3.0]).unwrap().r2, 0.0);
    }

    #[test]
    fn test_metrics_reject_bad_input() {
        assert!(matches!(
            RegressionMetrics::compute(&[1.0], &[1.0, 2.0]).unwrap_err(),
            RiskError::LengthMismatch { .. }
        ));
        assert!(ClassificationMetrics::compute(&[], &[]).is_err());
    }

    #[test]
    fn test_classification_metrics() {
        let y_true = [true, false, true, true, false, false];
        let y_pred = [true, false, false, true, true, false];
        let m = ClassificationMetrics::compute(&y_true, &y_pred).unwrap();

        assert_relative_eq!(m.accuracy, 4.0 / 6.0);
        assert_relative_eq!(m.f1, 2.0 / 3.0);
        assert_eq!(m.report.classes.len(), 2);
        assert_eq!(m.report.classes[1].support, 3);
        assert_relative_eq!(m.report.weighted_avg.precision, 2.0 / 3.0);
    }

    #[test]
    fn test_f1_undefined_is_zero() {
        let m =
            ClassificationMetrics::compute(&[false, false, true], &[false, false, false]).unwrap();
        assert_eq!(m.f1, 0.0);
        assert_relative_eq!(m.accuracy, 2.0 / 3.0);
        assert_eq!(m.report.classes[1].precision, 0.0);
    }

    #[test]
    fn test_report_rendering() {
        let y_true = [true, false, true, true, false, false];
        let y_pred = [true, false, false, true, true, false];
        let text = ClassificationReport::compute(&y_true, &y_pred).unwrap().render(3);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "              precision    recall  f1-score   support");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "           0      0.667     0.667     0.667         3");
        assert_eq!(lines[3], "           1      0.667     0.667     0.667         3");
        assert_eq!(lines[5], "    accuracy                          0.667         6");
        assert_eq!(lines[6], "   macro avg      0.667     0.667     0.667         6");
        assert_eq!(lines[7], "weighted avg      0.667     0.667     0.667         6");
    }
}
