use serde::{Deserialize, Serialize};

use crate::import::JobRecord;

/// Name of the label every task carries for free-text descriptions
pub const DESCRIPTIONS_LABEL: &str = "Descriptions";

/// Text attributes attached to the descriptions label
pub const DESCRIPTION_ATTRIBUTES: [&str; 3] =
    ["Title", "English_Image_Description", "Scene_Description"];

/// JPEG quality CVAT uses when it builds task chunks from the image
pub const IMAGE_QUALITY: u8 = 70;

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub key: String,
}

/// Body of `POST /api/tasks`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub labels: Vec<LabelSpec>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LabelSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSpec>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub mutable: bool,
    pub input_type: String,
    pub values: Vec<String>,
    /// Blank, so annotators start from an empty text box
    pub default_value: String,
    pub required: bool,
}

impl AttributeSpec {
    fn free_text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mutable: true,
            input_type: "text".to_string(),
            values: vec![String::new()],
            default_value: String::new(),
            required: true,
        }
    }
}

impl TaskSpec {
    /// Task for one record: its own labels plus the descriptions label
    pub fn for_record(record: &JobRecord) -> Self {
        let mut labels: Vec<LabelSpec> = record
            .labels
            .iter()
            .map(|name| LabelSpec {
                name: name.clone(),
                attributes: Vec::new(),
            })
            .collect();

        labels.push(LabelSpec {
            name: DESCRIPTIONS_LABEL.to_string(),
            attributes: DESCRIPTION_ATTRIBUTES
                .iter()
                .map(|name| AttributeSpec::free_text(name))
                .collect(),
        });

        TaskSpec {
            name: record.task_name(),
            labels,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct TaskResponse {
    pub id: u64,
}

/// Body of `POST /api/tasks/{id}/data` for remote resources
#[derive(Serialize, Debug)]
pub struct DataRequest<'a> {
    pub image_quality: u8,
    pub remote_files: Vec<&'a str>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DataResponse {
    #[serde(default)]
    pub rq_id: Option<String>,
}

/// State of a background request on the server
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Queued,
    Started,
    Finished,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
pub struct RequestStatus {
    pub status: RequestState,
    #[serde(default)]
    pub message: Option<String>,
}
