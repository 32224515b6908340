pub use enumset::EnumSet;
/// [crate::properties] holds the record schema shared by every stage of the pipeline: identifiers,
/// policy classes, category paths, and the validated [PolicyRecord] itself.
use enumset::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

pub use uuid::Uuid;

use crate::{config::CatalogConfig, error::CatalogError};

pub(crate) mod enumset_list {
    // Copied from enumset_derive/src/lib.rs SerdeRepr::List (line 475 in version 0.10.1)
    use crate::properties::PolicyClass;
    use enumset::EnumSet;
    use serde::{ser::SerializeSeq, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        set: &EnumSet<PolicyClass>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(set.len()))?;
        for bit in set.iter() {
            seq.serialize_element(&bit)?;
        }
        seq.end()
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> core::result::Result<EnumSet<PolicyClass>, D::Error> {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = EnumSet<PolicyClass>;
            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(formatter, "A list of PolicyClass values")
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut accum = EnumSet::<PolicyClass>::new();
                while let Some(val) = seq.next_element::<PolicyClass>()? {
                    accum |= val;
                }
                Ok(accum)
            }
        }
        de.deserialize_seq(Visitor)
    }
}

/// The policy-catalog namespace UUID. Record ids are v5 UUIDs derived under this namespace, so the
/// same payload always yields the same ids.
pub const UUID_NAMESPACE_POLICY_CATALOG: Uuid = Uuid::from_bytes([
    0x2f, 0x8e, 0x61, 0x0c, 0x7d, 0x45, 0x4b, 0x1a, 0x9c, 0x03, 0xe4, 0x57, 0x12, 0xb8, 0x6d, 0x90,
]);

/// Record ID
///
/// A UUID v5 derived from a record's registry key, value name, and ordinal. The ordinal counts
/// earlier records sharing the same (key, value name) pair, which keeps ids distinct for policies
/// that write the same registry value from different ADMX files.
///
/// Each component is hashed behind its byte length, so no choice of key or value name text can
/// make two different (key, value name, ordinal) triples share an id.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn derive(key: &str, value_name: &str, ordinal: usize) -> Self {
        let ordinal = (ordinal as u64).to_le_bytes();
        let mut name = Vec::with_capacity(key.len() + value_name.len() + 32);
        for component in [key.as_bytes(), value_name.as_bytes(), &ordinal[..]] {
            name.extend_from_slice(&(component.len() as u64).to_le_bytes());
            name.extend_from_slice(component);
        }
        RecordId(Uuid::new_v5(&UUID_NAMESPACE_POLICY_CATALOG, &name))
    }

    /// Placeholder for records that have been validated but not yet admitted to a store.
    pub fn nil() -> Self {
        RecordId(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.hyphenated().encode_lower(&mut Uuid::encode_buffer())
        )
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        RecordId(id)
    }
}

impl TryFrom<&str> for RecordId {
    type Error = CatalogError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        Uuid::parse_str(string)
            .map(RecordId)
            .map_err(|e| CatalogError::InvalidInput(format!("'{string}' is not a record id: {e}")))
    }
}

/// [PolicyClass] mirrors the ADMX `class` attribute: the hive a policy applies to. It is the tag
/// used for checkbox filtering.
#[derive(Debug, Default, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(repr = "u32")]
pub enum PolicyClass {
    /// HKEY_LOCAL_MACHINE
    Machine,
    /// HKEY_CURRENT_USER
    User,
    /// Applies to either hive. Records without a class land here.
    #[default]
    Both,
}

impl Display for PolicyClass {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for PolicyClass {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "machine" => Ok(PolicyClass::Machine),
            "user" => Ok(PolicyClass::User),
            "both" => Ok(PolicyClass::Both),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown policy class '{other}'"
            ))),
        }
    }
}

/// The set of active tags. Serializes as a list, e.g. `["Machine", "User"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSet(#[serde(with = "enumset_list")] pub EnumSet<PolicyClass>);

impl ClassSet {
    pub fn all() -> Self {
        ClassSet(EnumSet::all())
    }

    pub fn empty() -> Self {
        ClassSet(EnumSet::empty())
    }

    /// Flip membership of `class`. Returns whether it is now active.
    pub fn toggle(&mut self, class: PolicyClass) -> bool {
        if self.0.contains(class) {
            self.0.remove(class);
            false
        } else {
            self.0.insert(class);
            true
        }
    }
}

impl Default for ClassSet {
    fn default() -> Self {
        ClassSet::all()
    }
}

impl Deref for ClassSet {
    type Target = EnumSet<PolicyClass>;
    fn deref(&self) -> &EnumSet<PolicyClass> {
        &self.0
    }
}

impl From<EnumSet<PolicyClass>> for ClassSet {
    fn from(classes: EnumSet<PolicyClass>) -> Self {
        ClassSet(classes)
    }
}

impl Display for ClassSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(|class| class.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Ordered category segments locating a record in the tree. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<String>);

/// Tree nodes are addressed by their full path, which is stable across rebuilds.
pub type NodeId = CategoryPath;

impl CategoryPath {
    pub fn root() -> Self {
        CategoryPath(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryPath(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &CategoryPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn child<S: Into<String>>(&self, segment: S) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        CategoryPath(segments)
    }

    pub fn parent(&self) -> Option<CategoryPath> {
        self.0
            .split_last()
            .map(|(_, rest)| CategoryPath(rest.to_vec()))
    }

    pub fn label(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn display(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl Display for CategoryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display(crate::config::DEFAULT_PATH_SEPARATOR))
    }
}

impl<S: Into<String>> FromIterator<S> for CategoryPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        CategoryPath::new(iter)
    }
}

/// One entry of an enum or list policy element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// The textual attributes the text matcher looks at, in the order they are reported.
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
pub enum SearchField {
    Name,
    Key,
    ValueName,
    AdmxFile,
    ExplainText,
}

impl SearchField {
    pub const ALL: [SearchField; 5] = [
        SearchField::Name,
        SearchField::Key,
        SearchField::ValueName,
        SearchField::AdmxFile,
        SearchField::ExplainText,
    ];
}

/// A policy record as it arrives from the payload, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicy {
    pub name: Option<String>,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub value_type: Option<String>,
    pub explain_text: Option<String>,
    pub admx_file: Option<String>,
    /// Left untyped so a non-sequence is reported as a validation failure.
    pub category_path: Option<Value>,
    #[serde(alias = "tag")]
    pub policy_class: Option<String>,
    pub options: Option<Vec<PolicyOption>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fallback string fields consulted, in order, when `categoryPath` is absent.
const FALLBACK_PATH_FIELDS: [&str; 2] = ["gpPath", "parentCategory"];

/// Keys of [PolicyRecord] that must not be shadowed by pass-through attributes.
const RESERVED_KEYS: [&str; 1] = ["id"];

impl RawPolicy {
    /// Validate against the record schema. The returned record carries [RecordId::nil]; the store
    /// assigns the real id.
    pub fn into_record(
        mut self,
        index: usize,
        config: &CatalogConfig,
    ) -> Result<PolicyRecord, CatalogError> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(CatalogError::validation(index, "missing required field 'name'")),
        };

        let mut category_path = match self.category_path.take() {
            None | Some(Value::Null) => self.fallback_path(config),
            Some(Value::Array(items)) => {
                let mut segments = Vec::with_capacity(items.len());
                for (pos, item) in items.iter().enumerate() {
                    match item.as_str().map(str::trim) {
                        Some(segment) if !segment.is_empty() => segments.push(segment.to_string()),
                        _ => {
                            return Err(CatalogError::validation(
                                index,
                                format!("categoryPath segment {pos} is not a non-empty string"),
                            ))
                        }
                    }
                }
                CategoryPath(segments)
            }
            Some(other) => {
                return Err(CatalogError::validation(
                    index,
                    format!("categoryPath must be a sequence of strings, got {other}"),
                ))
            }
        };
        if category_path.is_root() {
            category_path = CategoryPath::new([config.uncategorized_label.clone()]);
        }

        let policy_class = match self.policy_class.as_deref() {
            None => PolicyClass::default(),
            Some(class) => PolicyClass::from_str(class).map_err(|e| match e {
                CatalogError::InvalidInput(reason) => CatalogError::validation(index, reason),
                other => other,
            })?,
        };

        for key in RESERVED_KEYS {
            if self.extra.remove(key).is_some() {
                tracing::debug!("record {index}: dropping reserved pass-through key '{key}'");
            }
        }

        Ok(PolicyRecord {
            id: RecordId::nil(),
            name,
            key: self.key,
            value_name: self.value_name,
            value_type: self.value_type,
            explain_text: self.explain_text,
            admx_file: self.admx_file,
            category_path,
            policy_class,
            options: self.options.unwrap_or_default(),
            extra: self.extra,
        })
    }

    fn fallback_path(&self, config: &CatalogConfig) -> CategoryPath {
        FALLBACK_PATH_FIELDS
            .iter()
            .filter_map(|field| self.extra.get(*field).and_then(Value::as_str))
            .map(|joined| {
                joined
                    .split(config.path_separator.as_str())
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .collect::<CategoryPath>()
            })
            .find(|path| !path.is_root())
            .unwrap_or_default()
    }
}

/// A validated policy record, owned by [crate::store::RecordStore].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub id: RecordId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admx_file: Option<String>,
    pub category_path: CategoryPath,
    pub policy_class: PolicyClass,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PolicyOption>,
    /// Attributes the core does not interpret, passed through to presentation unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyRecord {
    pub fn field(&self, field: SearchField) -> Option<&str> {
        match field {
            SearchField::Name => Some(self.name.as_str()),
            SearchField::Key => self.key.as_deref(),
            SearchField::ValueName => self.value_name.as_deref(),
            SearchField::AdmxFile => self.admx_file.as_deref(),
            SearchField::ExplainText => self.explain_text.as_deref(),
        }
    }

    /// The searchable projection, skipping absent fields.
    pub fn searchable_fields(&self) -> impl Iterator<Item = (SearchField, &str)> + '_ {
        SearchField::ALL
            .into_iter()
            .filter_map(move |field| self.field(field).map(|text| (field, text)))
    }
}
