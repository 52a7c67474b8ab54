use std::{
    collections::{HashMap, VecDeque},
    error::Error,
    fmt::Display,
};

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::{
    content::{Decoder, MediaType, DECODERS, MEDIA_TYPES},
    draft, ecma,
    formats::{Format, FORMATS},
    loader::UrlLoader,
    roots::Roots,
    util::*,
    Additional, Dependency, Enum, Items, Schema, SchemaIndex, Schemas, Type, TypeSet,
    ValidationError,
};

/// A draft of the JSON Schema specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Draft {
    V4,
    V6,
    V7,
    V2019_09,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::V2019_09
    }
}

impl Draft {
    pub(crate) fn internal(self) -> &'static draft::Draft {
        match self {
            Draft::V4 => &draft::DRAFT4,
            Draft::V6 => &draft::DRAFT6,
            Draft::V7 => &draft::DRAFT7,
            Draft::V2019_09 => &draft::DRAFT2019,
        }
    }
}

/// Compiles schemas, resolving `$ref`s and `$id`s, into a [`Schemas`] arena.
pub struct Compiler {
    roots: Roots,
    decoders: HashMap<String, &'static Decoder>,
    media_types: HashMap<String, &'static MediaType>,
    formats: HashMap<String, &'static Format>,
    assert_format: bool,
    assert_content: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            roots: Roots::default(),
            decoders: HashMap::new(),
            media_types: HashMap::new(),
            formats: HashMap::new(),
            assert_format: false,
            assert_content: false,
        }
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables evaluating `format` as an assertion on drafts where it is
    /// annotation-only by default.
    pub fn enable_format_assertions(&mut self) {
        self.assert_format = true;
    }

    /// Enables evaluating `contentEncoding`/`contentMediaType` as assertions;
    /// by default they are annotation-only, per the 2019-09 content vocabulary.
    pub fn enable_content_assertions(&mut self) {
        self.assert_content = true;
    }

    pub fn set_default_draft(&mut self, d: Draft) {
        self.roots.default_draft = d.internal();
    }

    pub fn register_url_loader(&mut self, scheme: &'static str, loader: Box<dyn UrlLoader>) {
        self.roots.loader.register(scheme, loader);
    }

    pub fn register_content_encoding(
        &mut self,
        name: &str,
        func: fn(&str) -> Result<Vec<u8>, Box<dyn Error>>,
    ) {
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        self.decoders.insert(name.to_owned(), Box::leak(Box::new(Decoder { name, func })));
    }

    pub fn register_content_media_type(
        &mut self,
        name: &str,
        func: fn(&[u8], bool) -> Result<Option<Value>, Box<dyn Error>>,
    ) {
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        self.media_types
            .insert(name.to_owned(), Box::leak(Box::new(MediaType { name, func })));
    }

    pub fn register_format(&mut self, name: &str, func: fn(&Value) -> Result<(), Box<dyn Error>>) {
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        self.formats.insert(name.to_owned(), Box::leak(Box::new(Format { name, func })));
    }

    fn decoder(&self, name: &str) -> Option<&'static Decoder> {
        self.decoders.get(name).copied().or_else(|| DECODERS.get(name))
    }

    fn media_type(&self, name: &str) -> Option<&'static MediaType> {
        self.media_types.get(name).copied().or_else(|| MEDIA_TYPES.get(name))
    }

    fn format(&self, name: &str) -> Option<&'static Format> {
        self.formats.get(name).copied().or_else(|| FORMATS.get(name))
    }

    /// Adds `doc` as the in-memory contents of `url`, to be used instead of
    /// loading it from the network/filesystem.
    pub fn add_resource(&mut self, url: &str, doc: Value) -> Result<bool, CompileError> {
        let uf = UrlFrag::absolute(url)?;
        self.roots.or_insert(uf.url, doc)
    }

    /// Compiles the schema located at `url` (with an optional fragment) into
    /// `target`, returning the index of its root schema.
    pub fn compile_url(&mut self, url: Url, target: &mut Schemas) -> Result<SchemaIndex, CompileError> {
        let (base, frag) = Fragment::split(url.as_str())?;
        let base_url = Url::parse(base).map_err(|e| CompileError::ParseUrlError {
            url: base.to_owned(),
            src: e.into(),
        })?;
        self.roots.or_load(base_url.clone())?;
        let up = {
            let root = self
                .roots
                .get(&base_url)
                .ok_or_else(|| CompileError::Bug("root must be loaded".into()))?;
            root.resolve_fragment(&frag)?
        };
        self.compile_loc(up, target)
    }

    fn compile_loc(&mut self, up: UrlPtr, target: &mut Schemas) -> Result<SchemaIndex, CompileError> {
        let mut queue: VecDeque<String> = VecDeque::new();
        let idx = target.enqueue(&mut queue, up.to_string());
        while let Some(loc) = queue.pop_front() {
            if target.get_by_loc(&loc).is_some() {
                continue;
            }
            self.compile_one(&loc, &mut queue, target)?;
        }
        Ok(SchemaIndex(idx))
    }

    fn enqueue_ref(
        &mut self,
        base: &Url,
        ref_str: &str,
        queue: &mut VecDeque<String>,
        target: &Schemas,
    ) -> Result<SchemaIndex, CompileError> {
        let uf = UrlFrag::join(base, ref_str)?;
        let up = self.roots.resolve(&uf)?;
        Ok(SchemaIndex(target.enqueue(queue, up.to_string())))
    }

    fn compile_regex(&self, pattern: &str) -> Result<Regex, CompileError> {
        let fixed = ecma::convert(pattern);
        Regex::new(&fixed).map_err(|e| CompileError::InvalidRegex {
            regex: pattern.to_owned(),
            src: e.into(),
        })
    }

    fn compile_one(&mut self, loc: &str, queue: &mut VecDeque<String>, target: &mut Schemas) -> Result<(), CompileError> {
        let (url_str, frag) = Fragment::split(loc)?;
        let ptr = match frag {
            Fragment::JsonPointer(ptr) => ptr,
            Fragment::Anchor(_) => {
                return Err(CompileError::Bug(format!("unexpected anchor in compiled loc {loc}").into()))
            }
        };
        let url = Url::parse(url_str).map_err(|e| CompileError::ParseUrlError {
            url: url_str.to_owned(),
            src: e.into(),
        })?;

        self.roots.or_load(url.clone())?;
        if let Some(root) = self.roots.get_mut(&url) {
            root.add_subschema(&ptr)?;
        }
        let (draft, v, res_ptr, base, has_format_vocab, has_content_vocab) = {
            let root = self
                .roots
                .get(&url)
                .ok_or_else(|| CompileError::Bug(format!("root {url} not loaded").into()))?;
            let draft = root.draft;
            let v = UrlPtr {
                url: url.clone(),
                ptr: ptr.clone(),
            }
            .lookup(&root.doc)?
            .clone();
            let res_ptr = root.resource(&ptr).ptr.clone();
            let base = root.base_url(&ptr).clone();
            let has_format_vocab = root.has_vocab("format");
            let has_content_vocab = root.has_vocab("content");
            (draft, v, res_ptr, base, has_format_vocab, has_content_vocab)
        };

        let idx = SchemaIndex(target.len());
        let mut schema = Schema::new(loc.to_owned());
        schema.idx = idx;
        schema.draft_version = draft.version;

        schema.resource = if res_ptr == ptr {
            idx
        } else {
            SchemaIndex(target.enqueue(
                queue,
                UrlPtr {
                    url: url.clone(),
                    ptr: res_ptr,
                }
                .to_string(),
            ))
        };

        match &v {
            Value::Bool(b) => {
                schema.boolean = Some(*b);
            }
            Value::Object(obj) => {
                macro_rules! enq {
                    ($ptr:expr) => {
                        SchemaIndex(target.enqueue(
                            queue,
                            UrlPtr {
                                url: url.clone(),
                                ptr: $ptr,
                            }
                            .to_string(),
                        ))
                    };
                }

                // $ref / $recursiveRef --
                if let Some(Value::String(r)) = obj.get("$ref") {
                    schema.ref_ = Some(self.enqueue_ref(&base, r, queue, target)?);
                }
                if draft.version >= 2019 {
                    if let Some(Value::String(r)) = obj.get("$recursiveRef") {
                        schema.recursive_ref = Some(self.enqueue_ref(&base, r, queue, target)?);
                    }
                    if let Some(Value::Bool(b)) = obj.get("$recursiveAnchor") {
                        schema.recursive_anchor = *b;
                    }
                }

                // type --
                if let Some(t) = obj.get("type") {
                    let mut types = TypeSet::default();
                    match t {
                        Value::String(s) => {
                            if let Some(t) = Type::from_str(s) {
                                types.insert(t);
                            }
                        }
                        Value::Array(arr) => {
                            for item in arr {
                                if let Value::String(s) = item {
                                    if let Some(t) = Type::from_str(s) {
                                        types.insert(t);
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                    schema.types = types;
                }

                // enum --
                if let Some(Value::Array(values)) = obj.get("enum") {
                    let mut types = TypeSet::default();
                    for v in values {
                        types.insert(Type::of(v));
                    }
                    schema.enum_ = Some(Enum {
                        types,
                        values: values.clone(),
                    });
                }

                // const --
                if let Some(c) = obj.get("const") {
                    schema.constant = Some(c.clone());
                }

                // format --
                if let Some(Value::String(name)) = obj.get("format") {
                    let assert =
                        draft.version < 2019 || self.assert_format || has_format_vocab;
                    if assert {
                        schema.format = self.format(name);
                    }
                }

                // not --
                if obj.contains_key("not") {
                    schema.not = Some(enq!(ptr.append("not")));
                }

                // allOf/anyOf/oneOf --
                if let Some(Value::Array(arr)) = obj.get("allOf") {
                    schema.all_of = (0..arr.len()).map(|i| enq!(ptr.append2("allOf", &i.to_string()))).collect();
                }
                if let Some(Value::Array(arr)) = obj.get("anyOf") {
                    schema.any_of = (0..arr.len()).map(|i| enq!(ptr.append2("anyOf", &i.to_string()))).collect();
                }
                if let Some(Value::Array(arr)) = obj.get("oneOf") {
                    schema.one_of = (0..arr.len()).map(|i| enq!(ptr.append2("oneOf", &i.to_string()))).collect();
                }

                // if/then/else --
                if draft.version >= 7 {
                    if obj.contains_key("if") {
                        schema.if_ = Some(enq!(ptr.append("if")));
                    }
                    if obj.contains_key("then") {
                        schema.then = Some(enq!(ptr.append("then")));
                    }
                    if obj.contains_key("else") {
                        schema.else_ = Some(enq!(ptr.append("else")));
                    }
                }

                // minProperties/maxProperties --
                schema.min_properties = obj.get("minProperties").and_then(load_usize);
                schema.max_properties = obj.get("maxProperties").and_then(load_usize);

                // required --
                if let Some(v) = obj.get("required") {
                    schema.required = to_strings(v);
                }

                // properties --
                if let Some(Value::Object(props)) = obj.get("properties") {
                    schema.properties = props
                        .keys()
                        .map(|pname| (pname.clone(), enq!(ptr.append2("properties", pname))))
                        .collect();
                }

                // patternProperties --
                if let Some(Value::Object(pp)) = obj.get("patternProperties") {
                    for pname in pp.keys() {
                        let regex = self.compile_regex(pname)?;
                        schema
                            .pattern_properties
                            .push((regex, enq!(ptr.append2("patternProperties", pname))));
                    }
                }

                // propertyNames --
                if draft.version >= 6 && obj.contains_key("propertyNames") {
                    schema.property_names = Some(enq!(ptr.append("propertyNames")));
                }

                // additionalProperties --
                if let Some(v) = obj.get("additionalProperties") {
                    schema.additional_properties = Some(match v {
                        Value::Bool(b) => Additional::Bool(*b),
                        _ => Additional::SchemaRef(enq!(ptr.append("additionalProperties"))),
                    });
                }
                schema.all_props_evaluated = obj.contains_key("additionalProperties");

                // dependencies --
                if let Some(Value::Object(deps)) = obj.get("dependencies") {
                    for (k, v) in deps {
                        let dep = match v {
                            Value::Array(_) => Dependency::Props(to_strings(v)),
                            _ => Dependency::SchemaRef(enq!(ptr.append2("dependencies", k))),
                        };
                        schema.dependencies.insert(k.clone(), dep);
                    }
                }

                if draft.version >= 2019 {
                    // dependentSchemas --
                    if let Some(Value::Object(ds)) = obj.get("dependentSchemas") {
                        for k in ds.keys() {
                            schema
                                .dependent_schemas
                                .insert(k.clone(), enq!(ptr.append2("dependentSchemas", k)));
                        }
                    }

                    // dependentRequired --
                    if let Some(Value::Object(dr)) = obj.get("dependentRequired") {
                        for (k, v) in dr {
                            schema.dependent_required.insert(k.clone(), to_strings(v));
                        }
                    }

                    // unevaluatedProperties --
                    if obj.contains_key("unevaluatedProperties") {
                        schema.unevaluated_properties = Some(enq!(ptr.append("unevaluatedProperties")));
                    }

                    // unevaluatedItems --
                    if obj.contains_key("unevaluatedItems") {
                        schema.unevaluated_items = Some(enq!(ptr.append("unevaluatedItems")));
                    }
                }

                // minItems/maxItems --
                schema.min_items = obj.get("minItems").and_then(load_usize);
                schema.max_items = obj.get("maxItems").and_then(load_usize);

                // uniqueItems --
                if let Some(Value::Bool(b)) = obj.get("uniqueItems") {
                    schema.unique_items = *b;
                }

                // items/additionalItems --
                match obj.get("items") {
                    Some(Value::Array(items)) => {
                        schema.items = Some(Items::SchemaRefs(
                            (0..items.len()).map(|i| enq!(ptr.append2("items", &i.to_string()))).collect(),
                        ));
                        schema.num_items_evaluated = items.len();
                        if let Some(v) = obj.get("additionalItems") {
                            schema.additional_items = Some(match v {
                                Value::Bool(b) => Additional::Bool(*b),
                                _ => Additional::SchemaRef(enq!(ptr.append("additionalItems"))),
                            });
                        }
                        schema.all_items_evaluated = obj.contains_key("additionalItems");
                    }
                    Some(_) => {
                        schema.items = Some(Items::SchemaRef(enq!(ptr.append("items"))));
                        schema.all_items_evaluated = true;
                    }
                    None => {}
                }

                // contains/minContains/maxContains --
                if draft.version >= 6 && obj.contains_key("contains") {
                    schema.contains = Some(enq!(ptr.append("contains")));
                    schema.min_contains = obj.get("minContains").and_then(load_usize);
                    schema.max_contains = obj.get("maxContains").and_then(load_usize);
                }

                // minLength/maxLength --
                schema.min_length = obj.get("minLength").and_then(load_usize);
                schema.max_length = obj.get("maxLength").and_then(load_usize);

                // pattern --
                if let Some(Value::String(pattern)) = obj.get("pattern") {
                    schema.pattern = Some(self.compile_regex(pattern)?);
                }

                if draft.version >= 7 {
                    let assert_content =
                        draft.version < 2019 || self.assert_content || has_content_vocab;
                    if assert_content {
                        // contentEncoding --
                        if let Some(Value::String(name)) = obj.get("contentEncoding") {
                            schema.content_encoding = self.decoder(name);
                        }
                        // contentMediaType --
                        if let Some(Value::String(name)) = obj.get("contentMediaType") {
                            schema.content_media_type = self.media_type(name);
                        }
                    }
                    // contentSchema --
                    if obj.contains_key("contentSchema") {
                        schema.content_schema = Some(enq!(ptr.append("contentSchema")));
                    }
                }

                // minimum/maximum/exclusiveMinimum/exclusiveMaximum/multipleOf --
                schema.minimum = load_num(obj, "minimum");
                schema.maximum = load_num(obj, "maximum");
                if draft.version == 4 {
                    // draft-04 spells exclusiveMinimum/Maximum as booleans toggling minimum/maximum
                    if let Some(Value::Bool(true)) = obj.get("exclusiveMinimum") {
                        schema.exclusive_minimum = schema.minimum.take();
                    }
                    if let Some(Value::Bool(true)) = obj.get("exclusiveMaximum") {
                        schema.exclusive_maximum = schema.maximum.take();
                    }
                } else {
                    schema.exclusive_minimum = load_num(obj, "exclusiveMinimum");
                    schema.exclusive_maximum = load_num(obj, "exclusiveMaximum");
                }
                schema.multiple_of = load_num(obj, "multipleOf");
            }
            _ => {}
        }

        target.insert(loc.to_owned(), schema);
        Ok(())
    }
}

fn load_usize(v: &Value) -> Option<usize> {
    v.as_u64().and_then(|n| usize::try_from(n).ok())
}

fn load_num(obj: &Map<String, Value>, kw: &str) -> Option<serde_json::Number> {
    match obj.get(kw) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

fn to_strings(v: &Value) -> Vec<String> {
    let Value::Array(arr) = v else {
        return vec![];
    };
    arr.iter().filter_map(|t| t.as_str().map(String::from)).collect()
}

// -- errors

#[derive(Debug)]
pub enum CompileError {
    Bug(Box<dyn Error>),
    LoadUrlError {
        url: String,
        src: Box<dyn Error>,
    },
    ParseUrlError {
        url: String,
        src: Box<dyn Error>,
    },
    ParseIdError {
        loc: Url,
    },
    ParseAnchorError {
        loc: Url,
    },
    InvalidJsonPointer(String),
    JsonPointerNotFound(String),
    InvalidMetaSchemaUrl {
        url: String,
        src: Box<dyn Error>,
    },
    UnsupportedDraft {
        url: Url,
    },
    MetaSchemaCycle {
        url: Url,
    },
    UnsupprtedVocabulary {
        url: String,
        vocabulary: String,
    },
    UnsupportedUrlScheme {
        url: String,
    },
    AnchorNotFound {
        url: String,
        reference: String,
    },
    DuplicateId {
        url: String,
        id: String,
    },
    DuplicateAnchor {
        url: String,
        anchor: String,
        ptr1: JsonPointer,
        ptr2: JsonPointer,
    },
    InvalidRegex {
        regex: String,
        src: Box<dyn Error>,
    },
    ValidationError {
        url: String,
        src: ValidationError,
    },
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bug(e) => write!(f, "bug: {e}. please file an issue"),
            Self::LoadUrlError { url, src } => write!(f, "error loading {url}: {src}"),
            Self::ParseUrlError { url, src } => write!(f, "error parsing {url}: {src}"),
            Self::ParseIdError { loc } => write!(f, "error parsing id at {loc}"),
            Self::ParseAnchorError { loc } => write!(f, "error parsing anchor at {loc}"),
            Self::InvalidJsonPointer(loc) => write!(f, "invalid json-pointer {loc}"),
            Self::JsonPointerNotFound(loc) => write!(f, "json-pointer in {loc} not found"),
            Self::InvalidMetaSchemaUrl { url, src } => write!(f, "invalid $schema in {url}: {src}"),
            Self::UnsupportedDraft { url } => write!(f, "draft {url} is not supported"),
            Self::MetaSchemaCycle { url } => write!(f, "cycle in resolving $schema {url}"),
            Self::UnsupprtedVocabulary { url, vocabulary } => {
                write!(f, "unsupported vocabulary {vocabulary} in {url}")
            }
            Self::UnsupportedUrlScheme { url } => write!(f, "unsupported scheme in {url}"),
            Self::AnchorNotFound { url, reference } => write!(f, "anchor in {reference} not found in {url}"),
            Self::DuplicateId { url, id } => write!(f, "duplicate id {id} in {url}"),
            Self::DuplicateAnchor { url, anchor, ptr1, ptr2 } => {
                write!(f, "duplicate anchor {anchor} in {url} at {ptr1} and {ptr2}")
            }
            Self::InvalidRegex { regex, src } => write!(f, "invalid regex {regex}: {src}"),
            Self::ValidationError { url, src } => write!(f, "{url} does not validate against its metaschema: {src}"),
        }
    }
}

impl Error for CompileError {}

impl From<url::ParseError> for CompileError {
    fn from(e: url::ParseError) -> Self {
        Self::ParseUrlError {
            url: String::new(),
            src: e.into(),
        }
    }
}
