use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use validator::Validate;

/// One row of import work: the image to annotate and the labels its task gets
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Validate)]
pub struct JobRecord {
    #[validate(length(min = 1, message = "missing required field ID"))]
    pub id: String,

    #[validate(url(message = "URL is not a well-formed URL"))]
    pub image_url: String,

    pub labels: Vec<String>,
}

impl JobRecord {
    /// Build a record from raw CSV cells, checking every field
    ///
    /// # Returns
    /// - `Ok(JobRecord)` - all fields present and well-formed
    /// - `Err(Vec<String>)` - one human-readable message per problem found
    pub fn from_cells(id: &str, url: &str, labels: Option<&str>) -> Result<Self, Vec<String>> {
        let mut problems = Vec::new();

        let id = id.trim();
        let url = url.trim();
        if url.is_empty() {
            problems.push("missing required field URL".to_string());
        }

        let labels = match labels.map(parse_labels).transpose() {
            Ok(labels) => labels.unwrap_or_default(),
            Err(e) => {
                problems.push(format!("invalid Labels: {}", e));
                Vec::new()
            }
        };

        let record = JobRecord {
            id: id.to_string(),
            image_url: url.to_string(),
            labels,
        };

        if let Err(validation_errors) = record.validate() {
            for (field, errors) in validation_errors.field_errors() {
                // An empty URL was already reported as missing
                if field == "image_url" && url.is_empty() {
                    continue;
                }
                problems.extend(errors.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation error in field: {}", field))
                }));
            }
        } else if let Err(reason) = check_remote_url(&record.image_url) {
            problems.push(reason);
        }

        if problems.is_empty() {
            Ok(record)
        } else {
            Err(problems)
        }
    }

    /// Name of the CVAT task created for this record
    pub fn task_name(&self) -> String {
        format!("Segmentation_{}", self.id)
    }
}

/// CVAT can only fetch remote files over http(s) from a named host.
fn check_remote_url(raw: &str) -> Result<(), String> {
    let parsed = Url::parse(raw).map_err(|e| format!("URL is not a well-formed URL: {}", e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "URL scheme '{}' is not supported, expected http or https",
            parsed.scheme()
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(())
}

/// Why a `Labels` cell could not be parsed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label {position} is empty")]
    Empty { position: usize },

    #[error("label '{name}' appears more than once")]
    Duplicate { name: String },
}

/// Split a comma-separated `Labels` cell into trimmed label names
///
/// Blank input yields no labels. Empty entries such as `cat,,dog` or a
/// trailing comma are rejected rather than dropped.
pub fn parse_labels(raw: &str) -> Result<Vec<String>, LabelError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut labels: Vec<String> = Vec::new();
    for (index, part) in raw.split(',').enumerate() {
        let name = part.trim();
        if name.is_empty() {
            return Err(LabelError::Empty { position: index + 1 });
        }
        if labels.iter().any(|existing| existing == name) {
            return Err(LabelError::Duplicate {
                name: name.to_string(),
            });
        }
        labels.push(name.to_string());
    }
    Ok(labels)
}

/// A CSV row excluded from dispatch, with the reason it was excluded
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// 1-based line number in the CSV file
    pub line: u64,
    /// Raw id of the row, when it could be read
    pub id: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Line {}: ID: {}, Error: {}",
            self.line,
            self.id.as_deref().unwrap_or("<unknown>"),
            self.reason
        )
    }
}
