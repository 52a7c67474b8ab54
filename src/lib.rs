#![allow(dead_code)]

mod compiler;
mod content;
mod decimal;
mod draft;
mod ecma;
mod formats;
mod loader;
mod output;
mod root;
mod roots;
mod util;
mod validator;

pub use compiler::{CompileError, Compiler, Draft};
pub use loader::UrlLoader;
pub use output::{FlagOutput, OutputError, OutputUnit};

use std::{
    collections::{HashMap, VecDeque},
    error::Error,
    fmt::Display,
};

use content::{Decoder, MediaType};
use formats::Format;
use regex::Regex;
use serde_json::{Number, Value};
use util::{join_iter, quote};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaIndex(usize);

#[derive(Default)]
pub struct Schemas {
    list: Vec<Schema>,
    map: HashMap<String, usize>, // loc => schema-index
}

impl Schemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    pub(crate) fn enqueue(&self, queue: &mut VecDeque<String>, mut loc: String) -> usize {
        if loc.rfind('#').is_none() {
            loc.push('#');
        }
        if let Some(&index) = self.map.get(&loc) {
            return index;
        }
        if let Some(qindex) = queue.iter().position(|e| *e == loc) {
            return self.list.len() + qindex;
        }
        queue.push_back(loc);
        self.list.len() + queue.len() - 1
    }

    pub(crate) fn insert(&mut self, loc: String, sch: Schema) -> SchemaIndex {
        let index = self.list.len();
        self.map.insert(loc, index);
        self.list.push(sch);
        SchemaIndex(index)
    }

    pub(crate) fn get(&self, index: SchemaIndex) -> &Schema {
        &self.list[index.0]
    }

    pub(crate) fn get_by_loc(&self, loc: &str) -> Option<&Schema> {
        let mut loc = std::borrow::Cow::from(loc);
        if loc.rfind('#').is_none() {
            let mut s = loc.into_owned();
            s.push('#');
            loc = std::borrow::Cow::from(s);
        }
        self.map.get(loc.as_ref()).and_then(|&i| self.list.get(i))
    }

    /// Validates `v` with the schema identified by `sch_index`.
    ///
    /// # Panics
    ///
    /// Panics if `sch_index` was not produced by this `Schemas` instance.
    pub fn validate(&self, v: &Value, sch_index: SchemaIndex) -> Result<(), ValidationError> {
        let schema = self.get(sch_index);
        validator::validate(v, schema, self)
    }

    /// Validates JSON text with the schema identified by `sch_index`.
    pub fn validate_str(&self, json: &str, sch_index: SchemaIndex) -> Result<(), ValidationError> {
        let v: Value = serde_json::from_str(json).map_err(|e| ValidationError {
            keyword_location: String::new(),
            absolute_keyword_location: self.get(sch_index).loc.clone(),
            instance_location: String::new(),
            kind: ErrorKind::InvalidJson {
                err: Box::new(e),
            },
            causes: vec![],
        })?;
        self.validate(&v, sch_index)
    }
}

#[derive(Default)]
pub(crate) struct Schema {
    pub(crate) draft_version: usize,
    pub(crate) idx: SchemaIndex,
    pub(crate) loc: String,
    pub(crate) resource: SchemaIndex,

    // type agnostic --
    pub(crate) boolean: Option<bool>,
    pub(crate) ref_: Option<SchemaIndex>,
    pub(crate) recursive_ref: Option<SchemaIndex>,
    pub(crate) recursive_anchor: bool,
    pub(crate) types: TypeSet,
    pub(crate) enum_: Option<Enum>,
    pub(crate) constant: Option<Value>,
    pub(crate) not: Option<SchemaIndex>,
    pub(crate) all_of: Vec<SchemaIndex>,
    pub(crate) any_of: Vec<SchemaIndex>,
    pub(crate) one_of: Vec<SchemaIndex>,
    pub(crate) if_: Option<SchemaIndex>,
    pub(crate) then: Option<SchemaIndex>,
    pub(crate) else_: Option<SchemaIndex>,
    pub(crate) format: Option<&'static Format>,

    // object --
    pub(crate) min_properties: Option<usize>,
    pub(crate) max_properties: Option<usize>,
    pub(crate) required: Vec<String>,
    pub(crate) properties: HashMap<String, SchemaIndex>,
    pub(crate) pattern_properties: Vec<(Regex, SchemaIndex)>,
    pub(crate) property_names: Option<SchemaIndex>,
    pub(crate) additional_properties: Option<Additional>,
    pub(crate) dependent_required: HashMap<String, Vec<String>>,
    pub(crate) dependent_schemas: HashMap<String, SchemaIndex>,
    pub(crate) dependencies: HashMap<String, Dependency>,
    pub(crate) unevaluated_properties: Option<SchemaIndex>,
    pub(crate) all_props_evaluated: bool,

    // array --
    pub(crate) min_items: Option<usize>,
    pub(crate) max_items: Option<usize>,
    pub(crate) unique_items: bool,
    pub(crate) min_contains: Option<usize>,
    pub(crate) max_contains: Option<usize>,
    pub(crate) contains: Option<SchemaIndex>,
    pub(crate) items: Option<Items>,
    pub(crate) additional_items: Option<Additional>,
    pub(crate) unevaluated_items: Option<SchemaIndex>,
    pub(crate) all_items_evaluated: bool,
    pub(crate) num_items_evaluated: usize,

    // string --
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) content_encoding: Option<&'static Decoder>,
    pub(crate) content_media_type: Option<&'static MediaType>,
    pub(crate) content_schema: Option<SchemaIndex>,

    // number --
    pub(crate) minimum: Option<Number>,
    pub(crate) maximum: Option<Number>,
    pub(crate) exclusive_minimum: Option<Number>,
    pub(crate) exclusive_maximum: Option<Number>,
    pub(crate) multiple_of: Option<Number>,
}

impl Schema {
    pub(crate) fn new(loc: String) -> Self {
        Self {
            loc,
            ..Default::default()
        }
    }
}

impl Default for SchemaIndex {
    fn default() -> Self {
        SchemaIndex(0)
    }
}

#[derive(Debug)]
pub(crate) struct Enum {
    pub(crate) types: TypeSet,
    pub(crate) values: Vec<Value>,
}

#[derive(Debug)]
pub(crate) enum Items {
    SchemaRef(SchemaIndex),
    SchemaRefs(Vec<SchemaIndex>),
}

#[derive(Debug)]
pub(crate) enum Additional {
    Bool(bool),
    SchemaRef(SchemaIndex),
}

#[derive(Debug)]
pub(crate) enum Dependency {
    Props(Vec<String>),
    SchemaRef(SchemaIndex),
}

// -- types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl Type {
    pub(crate) fn of(v: &Value) -> Self {
        match v {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Boolean,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Array(_) => Type::Array,
            Value::Object(_) => Type::Object,
        }
    }

    pub(crate) fn from_str(value: &str) -> Option<Self> {
        match value {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }

    fn primitive(v: &Value) -> bool {
        !matches!(Self::of(v), Self::Array | Self::Object)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::Integer => write!(f, "integer"),
            Type::String => write!(f, "string"),
            Type::Array => write!(f, "array"),
            Type::Object => write!(f, "object"),
        }
    }
}

/// A compact bitset of the 7 JSON-Schema `type` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TypeSet(u8);

const ALL_TYPES: [Type; 7] = [
    Type::Null,
    Type::Boolean,
    Type::Number,
    Type::Integer,
    Type::String,
    Type::Array,
    Type::Object,
];

impl TypeSet {
    pub(crate) fn insert(&mut self, t: Type) {
        self.0 |= t.bit();
    }

    pub(crate) fn contains(&self, t: Type) -> bool {
        self.0 & t.bit() != 0
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Type> + '_ {
        ALL_TYPES.iter().copied().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<Type> for TypeSet {
    fn from_iter<I: IntoIterator<Item = Type>>(iter: I) -> Self {
        let mut set = TypeSet::default();
        for t in iter {
            set.insert(t);
        }
        set
    }
}

// -- errors

#[derive(Debug)]
pub struct ValidationError {
    pub keyword_location: String,
    pub absolute_keyword_location: String,
    pub instance_location: String,
    pub kind: ErrorKind,
    pub causes: Vec<ValidationError>,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_tree(
            f: &mut std::fmt::Formatter<'_>,
            err: &ValidationError,
            depth: usize,
        ) -> std::fmt::Result {
            if !matches!(err.kind, ErrorKind::Group) {
                writeln!(
                    f,
                    "{:indent$}jsonschema: {} does not validate with {}: {}",
                    "",
                    quote(&err.instance_location),
                    err.absolute_keyword_location,
                    err.kind,
                    indent = depth * 2,
                )?;
            }
            for cause in &err.causes {
                write_tree(f, cause, depth + 1)?;
            }
            Ok(())
        }
        write_tree(f, self, 0)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum ErrorKind {
    Group,
    Schema {
        url: String,
    },
    ContentSchema,
    PropertyName {
        prop: String,
    },
    Reference {
        kw: &'static str,
        url: String,
    },
    RefCycle {
        url: String,
        kw_loc1: String,
        kw_loc2: String,
    },
    FalseSchema,
    Type {
        got: Type,
        want: TypeSet,
    },
    Enum {
        want: Vec<Value>,
    },
    Const {
        want: Value,
    },
    Format {
        got: Value,
        want: &'static str,
        err: Box<dyn Error>,
    },
    MinProperties {
        got: usize,
        want: usize,
    },
    MaxProperties {
        got: usize,
        want: usize,
    },
    Required {
        want: Vec<String>,
    },
    Dependency {
        prop: String,
        missing: Vec<String>,
    },
    DependentRequired {
        prop: String,
        missing: Vec<String>,
    },
    MinItems {
        got: usize,
        want: usize,
    },
    MaxItems {
        got: usize,
        want: usize,
    },
    Contains,
    MinContains {
        got: Vec<usize>,
        want: usize,
    },
    MaxContains {
        got: Vec<usize>,
        want: usize,
    },
    UniqueItems {
        got: [usize; 2],
    },
    AdditionalItems {
        got: usize,
    },
    AdditionalProperties {
        got: Vec<String>,
    },
    MinLength {
        got: usize,
        want: usize,
    },
    MaxLength {
        got: usize,
        want: usize,
    },
    Pattern {
        got: String,
        want: String,
    },
    ContentEncoding {
        want: &'static str,
        err: Box<dyn Error>,
    },
    ContentMediaType {
        got: Vec<u8>,
        want: &'static str,
        err: Box<dyn Error>,
    },
    Minimum {
        got: Number,
        want: Number,
    },
    Maximum {
        got: Number,
        want: Number,
    },
    ExclusiveMinimum {
        got: Number,
        want: Number,
    },
    ExclusiveMaximum {
        got: Number,
        want: Number,
    },
    MultipleOf {
        got: Number,
        want: Number,
    },
    Not,
    AllOf,
    AnyOf,
    OneOf(Option<(usize, usize)>),
    InvalidJson {
        err: Box<dyn Error>,
    },
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group => write!(f, "validation failed"),
            Self::Schema { url } => write!(f, "jsonschema validation failed with {url}"),
            Self::ContentSchema => write!(f, "contentSchema failed"),
            Self::PropertyName { prop } => write!(f, "propertyName {} does not match", quote(prop)),
            Self::Reference { kw, url } => write!(f, "{kw}: {url}"),
            Self::RefCycle {
                url,
                kw_loc1,
                kw_loc2,
            } => write!(f, "both {kw_loc1} and {kw_loc2} in {url} resolve to same schema"),
            Self::FalseSchema => write!(f, "false schema"),
            Self::Type { got, want } => {
                let want = join_iter(want.iter(), ", ");
                write!(f, "want {want}, but got {got}")
            }
            Self::Enum { want } => {
                if want.iter().all(Type::primitive) {
                    if want.len() == 1 {
                        write!(f, "value must be {:?}", want[0])
                    } else {
                        let want = join_iter(want.iter().map(|e| format!("{e:?}")), " or ");
                        write!(f, "value must be one of {want}")
                    }
                } else {
                    write!(f, "enum failed")
                }
            }
            Self::Const { want } => {
                if Type::primitive(want) {
                    write!(f, "value must be {want}")
                } else {
                    write!(f, "const failed")
                }
            }
            Self::Format { got, want, .. } => write!(f, "{got} is not valid {want}"),
            Self::MinProperties { got, want } => {
                write!(f, "minimum {want} properties allowed, but got {got} properties")
            }
            Self::MaxProperties { got, want } => {
                write!(f, "maximum {want} properties allowed, but got {got} properties")
            }
            Self::AdditionalProperties { got } => write!(
                f,
                "additionalProperties {} not allowed",
                join_iter(got.iter().map(quote), ", ")
            ),
            Self::Required { want } => {
                write!(f, "missing properties {}", join_iter(want.iter().map(quote), ", "))
            }
            Self::Dependency { prop, missing } => write!(
                f,
                "properties {} required, since {} exists",
                join_iter(missing.iter().map(quote), ", "),
                quote(prop)
            ),
            Self::DependentRequired { prop, missing } => write!(
                f,
                "properties {} required, if {} property exists",
                join_iter(missing.iter().map(quote), ", "),
                quote(prop)
            ),
            Self::MinItems { got, want } => write!(f, "minimum {want} items allowed, but got {got} items"),
            Self::MaxItems { got, want } => write!(f, "maximum {want} items allowed, but got {got} items"),
            Self::Contains => write!(f, "no items match contains schema"),
            Self::MinContains { got, want } => write!(
                f,
                "minimum {want} valid items required, but found {} valid items at {}",
                got.len(),
                join_iter(got, ", ")
            ),
            Self::MaxContains { got, want } => write!(
                f,
                "maximum {want} items allowed to match contains schema, but found {} items at {}",
                got.len(),
                join_iter(got, ", ")
            ),
            Self::UniqueItems { got: [i, j] } => write!(f, "items at {i} and {j} are equal"),
            Self::AdditionalItems { got } => write!(f, "last {got} additional items are not allowed"),
            Self::MinLength { got, want } => write!(f, "length must be >={want}, but got {got}"),
            Self::MaxLength { got, want } => write!(f, "length must be <={want}, but got {got}"),
            Self::Pattern { got, want } => write!(f, "{} does not match pattern {}", quote(got), quote(want)),
            Self::ContentEncoding { want, .. } => write!(f, "value is not {} encoded", quote(want)),
            Self::ContentMediaType { want, .. } => write!(f, "value is not of mediatype {}", quote(want)),
            Self::Minimum { got, want } => write!(f, "must be >={want}, but got {got}"),
            Self::Maximum { got, want } => write!(f, "must be <={want}, but got {got}"),
            Self::ExclusiveMinimum { got, want } => write!(f, "must be > {want} but got {got}"),
            Self::ExclusiveMaximum { got, want } => write!(f, "must be < {want} but got {got}"),
            Self::MultipleOf { got, want } => write!(f, "{got} is not multipleOf {want}"),
            Self::Not => write!(f, "not failed"),
            Self::AllOf => write!(f, "allOf failed"),
            Self::AnyOf => write!(f, "anyOf failed"),
            Self::OneOf(Some((i, j))) => {
                write!(f, "want valid against oneOf subschema, but valid against subschemas {i} and {j}")
            }
            Self::OneOf(None) => write!(f, "oneOf failed"),
            Self::InvalidJson { err } => write!(f, "invalid json: {err}"),
        }
    }
}
