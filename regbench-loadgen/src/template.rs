//! Request bodies for the `create` operation.
//!
//! A [`BodyTemplate`] is an immutable descriptor document. Every create instantiates an independent
//! copy of it and assigns fresh identifiers to the top-level `id` and to every entry of the
//! sub-resource array.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Default name of the array holding sub-resource descriptors.
pub const DEFAULT_SUB_RESOURCES_FIELD: &str = "submodelDescriptors";

/// Offset applied to the run seed for the identifier stream in [`IdMode::Seeded`].
const ID_STREAM_OFFSET: u64 = 0x1D5_0F_5EED;

/// Errors loading a body template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("failed to read template file")]
    Io(#[from] std::io::Error),
    /// The template file is not valid JSON.
    #[error("template is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// The template is valid JSON, but not an object.
    #[error("template must be a JSON object")]
    NotAnObject,
}

/// How identifiers for new descriptors are generated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    /// Random UUIDv4s, unique across runs.
    #[default]
    Random,
    /// UUIDs derived from the run seed, so request bodies repeat across runs.
    ///
    /// Repeating a run against a registry that still holds the previous run's descriptors will
    /// produce conflicts.
    Seeded,
}

/// Formatting and generation of identifiers assigned to new descriptors.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IdScheme {
    /// Generation mode, see [`IdMode`].
    pub mode: IdMode,
    /// Prefix of top-level descriptor identifiers.
    pub prefix: String,
    /// Prefix of sub-resource identifiers.
    pub sub_resource_prefix: String,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self {
            mode: IdMode::Random,
            prefix: "https://example.org/aas/".into(),
            sub_resource_prefix: "https://example.org/submodel/".into(),
        }
    }
}

#[derive(Debug)]
enum IdSource {
    Random,
    Seeded(SmallRng),
}

/// Produces globally unique identifiers according to an [`IdScheme`].
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    sub_resource_prefix: String,
    source: IdSource,
}

impl IdGenerator {
    /// Creates a generator. The seed is only used in [`IdMode::Seeded`].
    pub fn new(scheme: &IdScheme, seed: u64) -> Self {
        let source = match scheme.mode {
            IdMode::Random => IdSource::Random,
            IdMode::Seeded => {
                IdSource::Seeded(SmallRng::seed_from_u64(seed.wrapping_add(ID_STREAM_OFFSET)))
            }
        };

        Self {
            prefix: scheme.prefix.clone(),
            sub_resource_prefix: scheme.sub_resource_prefix.clone(),
            source,
        }
    }

    fn next_uuid(&mut self) -> Uuid {
        match &mut self.source {
            IdSource::Random => Uuid::new_v4(),
            IdSource::Seeded(rng) => uuid::Builder::from_random_bytes(rng.random()).into_uuid(),
        }
    }

    /// A new top-level descriptor identifier.
    pub fn descriptor_id(&mut self) -> String {
        let uuid = self.next_uuid();
        format!("{}{}", self.prefix, uuid)
    }

    /// A new sub-resource identifier.
    pub fn sub_resource_id(&mut self) -> String {
        let uuid = self.next_uuid();
        format!("{}{}", self.sub_resource_prefix, uuid)
    }
}

/// A descriptor body ready to be submitted, along with the identifiers assigned to it.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDescriptor {
    /// Identifier assigned to the top-level `id` field.
    pub id: String,
    /// Identifiers assigned to the sub-resources, in document order.
    pub sub_resource_ids: Vec<String>,
    /// The full request body.
    pub body: Value,
}

/// An immutable descriptor document used as the body of create requests.
#[derive(Clone, Debug)]
pub struct BodyTemplate {
    document: Value,
    sub_resources_field: String,
}

impl BodyTemplate {
    /// Creates a template from a JSON value, which must be an object.
    pub fn from_value(document: Value) -> Result<Self, TemplateError> {
        if !document.is_object() {
            return Err(TemplateError::NotAnObject);
        }

        Ok(Self {
            document,
            sub_resources_field: DEFAULT_SUB_RESOURCES_FIELD.into(),
        })
    }

    /// Loads a template from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, TemplateError> {
        let contents = std::fs::read(path)?;
        Self::from_value(serde_json::from_slice(&contents)?)
    }

    /// Changes the name of the array whose entries receive sub-resource identifiers.
    pub fn sub_resources_field(mut self, field: impl Into<String>) -> Self {
        self.sub_resources_field = field.into();
        self
    }

    /// Produces an independent copy of the template with fresh identifiers.
    pub fn instantiate(&self, ids: &mut IdGenerator) -> NewDescriptor {
        let mut body = self.document.clone();
        let id = ids.descriptor_id();
        let mut sub_resource_ids = Vec::new();

        if let Some(object) = body.as_object_mut() {
            object.insert("id".into(), Value::String(id.clone()));

            if let Some(Value::Array(entries)) = object.get_mut(&self.sub_resources_field) {
                for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                    let sub_id = ids.sub_resource_id();
                    entry.insert("id".into(), Value::String(sub_id.clone()));
                    sub_resource_ids.push(sub_id);
                }
            }
        }

        NewDescriptor {
            id,
            sub_resource_ids,
            body,
        }
    }
}

impl Default for BodyTemplate {
    /// A shell descriptor with one submodel descriptor.
    fn default() -> Self {
        let document = json!({
            "description": [
                {"language": "en", "text": "Machine consisting of multiple parts which are assets provided by different companies"},
                {"language": "de", "text": "Maschine bestehend aus mehreren Assets, welche von verschiedenen anderen Firmen bereitgestellt werden"}
            ],
            "displayName": [
                {"language": "en", "text": "Composite Machine"},
                {"language": "de", "text": "Verbundmaschine"}
            ],
            "administration": {"version": "1", "revision": "1"},
            "assetKind": "Instance",
            "assetType": "machine",
            "globalAssetId": "https://example.org/ids/asset/5079_8944_8914_9414",
            "idShort": "machine",
            "id": "https://example.org/ids/aas/template",
            "endpoints": [
                {
                    "interface": "AAS-3.0",
                    "protocolInformation": {
                        "href": "https://example.org/aas-environment/shells/template",
                        "endpointProtocol": "https"
                    }
                }
            ],
            "submodelDescriptors": [
                {
                    "id": "https://example.org/ids/sm/template",
                    "endpoints": [
                        {
                            "interface": "SUBMODEL-3.0",
                            "protocolInformation": {
                                "href": "https://example.org/aas-environment/submodels/template",
                                "endpointProtocol": "https"
                            }
                        }
                    ]
                }
            ]
        });

        Self {
            document,
            sub_resources_field: DEFAULT_SUB_RESOURCES_FIELD.into(),
        }
    }
}
