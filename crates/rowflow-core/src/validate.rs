//! Validation entry point.
//!
//! The constraint engine itself is an external collaborator behind the
//! [`Validator`] trait. `validate_node` filters its violations by traversal
//! depth and raises a validation failure to the caller; it is never
//! downgraded to a row-scoped entry.

use rowflow_model::{ImportError, Result};

/// One constraint violation with a dotted property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub property_path: String,
    pub invalid_value: String,
    pub message: String,
}

/// External constraint validation engine.
pub trait Validator<N> {
    fn validate(&self, node: &N) -> Vec<Violation>;
}

/// Validates a node, keeping only violations within the configured
/// traversal depth (a dotted path like `a.b.c` lies at depth 2; it is kept
/// when `depth(path) - 1 < depth`). Returns `ImportError::Validation` with
/// the joined diagnostics when any violation remains.
pub fn validate_node<N>(validator: &dyn Validator<N>, node: &N, depth: usize) -> Result<()> {
    let mut diagnostics = Vec::new();
    for violation in validator.validate(node) {
        let separators = violation.property_path.matches('.').count();
        if separators.saturating_sub(1) < depth {
            diagnostics.push(format!(
                "{} = {}, {}",
                violation.property_path, violation.invalid_value, violation.message
            ));
        }
    }
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(ImportError::Validation(diagnostics.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node;

    struct FixedValidator(Vec<Violation>);

    impl Validator<Node> for FixedValidator {
        fn validate(&self, _node: &Node) -> Vec<Violation> {
            self.0.clone()
        }
    }

    fn violation(path: &str) -> Violation {
        Violation {
            property_path: path.to_string(),
            invalid_value: "null".to_string(),
            message: "must not be null".to_string(),
        }
    }

    #[test]
    fn no_violations_is_ok() {
        let validator = FixedValidator(Vec::new());
        assert!(validate_node(&validator, &Node, 1).is_ok());
    }

    #[test]
    fn violation_within_depth_is_raised() {
        let validator = FixedValidator(vec![violation("Node.name")]);
        let err = validate_node(&validator, &Node, 1).unwrap_err();
        match err {
            ImportError::Validation(message) => {
                assert!(message.contains("Node.name = null, must not be null"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn violation_beyond_depth_is_ignored() {
        let validator = FixedValidator(vec![violation("Node.child.name")]);
        assert!(validate_node(&validator, &Node, 1).is_ok());
    }

    #[test]
    fn mixed_depths_keep_only_shallow_violations() {
        let validator = FixedValidator(vec![violation("Node.name"), violation("Node.child.name")]);
        let err = validate_node(&validator, &Node, 1).unwrap_err();
        match err {
            ImportError::Validation(message) => {
                assert!(message.contains("Node.name"));
                assert!(!message.contains("Node.child.name"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
