use crate::dataset::Label;
use crate::error::{Result, TandemError};

/// Number of positions where `predicted` and `truth` agree.
pub fn correct_predictions(predicted: &[Label], truth: &[Label]) -> Result<usize> {
    if predicted.len() != truth.len() {
        return Err(TandemError::Configuration(format!(
            "{} predictions but {} true labels",
            predicted.len(),
            truth.len()
        )));
    }
    if predicted.is_empty() {
        return Err(TandemError::Configuration(
            "cannot score an empty prediction vector".to_string(),
        ));
    }

    Ok(predicted
        .iter()
        .zip(truth)
        .filter(|(prediction, label)| prediction == label)
        .count())
}

/// Percentage (0 to 100) of positions where `predicted` and `truth` differ.
pub fn misclassification_rate(predicted: &[Label], truth: &[Label]) -> Result<f64> {
    let errors = predicted.len() - correct_predictions(predicted, truth)?;

    Ok(errors as f64 / predicted.len() as f64 * 100.0)
}

/// Fraction (0 to 1) of matching positions.
pub fn accuracy(predicted: &[Label], truth: &[Label]) -> Result<f64> {
    Ok(correct_predictions(predicted, truth)? as f64 / predicted.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_zero() {
        let predictions = [0, 1, 2, 3, 3, 2];

        assert!(misclassification_rate(&predictions, &predictions).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn test_disjoint_vectors_score_hundred() {
        let rate = misclassification_rate(&[0, 1, 2, 3], &[1, 0, 3, 2]).unwrap();

        assert!((rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_agreement() {
        let rate = misclassification_rate(&[2, 3, 0, 1], &[0, 1, 0, 1]).unwrap();
        assert!((rate - 50.0).abs() < 1e-12);

        let accuracy = accuracy(&[0, 0, 0, 1], &[0, 0, 0, 0]).unwrap();
        assert!((accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_accuracy_is_an_exact_ratio() {
        let truth = [0; 10];
        let predicted = [0, 0, 0, 0, 0, 0, 0, 1, 1, 1];

        assert_eq!(correct_predictions(&predicted, &truth).unwrap(), 7);
        assert_eq!(accuracy(&predicted, &truth).unwrap(), 7.0 / 10.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = misclassification_rate(&[0, 1, 2], &[0, 1, 2, 3]);

        assert!(matches!(result, Err(TandemError::Configuration(_))));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            misclassification_rate(&[], &[]),
            Err(TandemError::Configuration(_))
        ));
    }
}
