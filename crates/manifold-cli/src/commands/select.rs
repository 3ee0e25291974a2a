use std::fmt;

use inquire::InquireError;
use manifold_core::Manifest;
use manifold_k8s::{ResourceSelector, SelectError};

/// Terminal multi-select over every manifest resource, all preselected.
pub struct InteractiveSelector;

struct Choice {
    name: String,
    kind: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

impl ResourceSelector for InteractiveSelector {
    fn select(&self, manifest: &Manifest) -> Result<Vec<String>, SelectError> {
        if manifest.is_empty() {
            return Ok(Vec::new());
        }

        let choices: Vec<Choice> = manifest
            .iter()
            .map(|(name, resource)| Choice {
                name: name.to_owned(),
                kind: match resource.kind() {
                    Some(kind) => kind.to_string(),
                    None => "unsupported".to_owned(),
                },
            })
            .collect();
        let all: Vec<usize> = (0..choices.len()).collect();

        let picked = inquire::MultiSelect::new("Resources to process:", choices)
            .with_default(&all)
            .prompt()
            .map_err(|e| match e {
                InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                    SelectError::Cancelled
                }
                other => SelectError::Failed {
                    source: Box::new(other),
                },
            })?;

        Ok(picked.into_iter().map(|c| c.name).collect())
    }
}
