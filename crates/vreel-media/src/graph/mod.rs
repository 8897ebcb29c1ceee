//! Typed FFmpeg filter graph.
//!
//! Builders add nodes (`[inputs] filter,filter [outputs]`) through
//! [`FilterGraph`], which owns label allocation. [`FilterGraph::finish`]
//! checks the wiring and renders the `-filter_complex` text; escaping for
//! FFmpeg's two parsing levels lives only in [`escape_value`].

pub mod audio;
pub mod video;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{MediaError, MediaResult};

pub use audio::{build_final_mix, FinalMix, MixInputs};
pub use video::{build_composition, VideoComposition};

/// Stream type carried by a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Stream specifier letter.
    pub fn specifier(&self) -> &'static str {
        match self {
            MediaKind::Video => "v",
            MediaKind::Audio => "a",
        }
    }
}

/// A named pad produced by exactly one node.
///
/// Only [`FilterGraph`] creates labels, which keeps names unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    name: String,
    kind: MediaKind,
}

impl Label {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.name)
    }
}

/// Something a node can consume or the output can map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamRef {
    /// First stream of the given kind in external input `index`
    Input { index: usize, kind: MediaKind },
    /// Output pad of an earlier node
    Label(Label),
}

impl StreamRef {
    pub fn kind(&self) -> MediaKind {
        match self {
            StreamRef::Input { kind, .. } => *kind,
            StreamRef::Label(label) => label.kind,
        }
    }

    /// Pad syntax inside the graph description.
    pub fn pad(&self) -> String {
        match self {
            StreamRef::Input { index, kind } => format!("[{}:{}]", index, kind.specifier()),
            StreamRef::Label(label) => label.to_string(),
        }
    }

    /// Argument for `-map`.
    pub fn map_arg(&self) -> String {
        match self {
            StreamRef::Input { index, kind } => format!("{}:{}:0", index, kind.specifier()),
            StreamRef::Label(label) => label.to_string(),
        }
    }
}

impl From<Label> for StreamRef {
    fn from(label: Label) -> Self {
        StreamRef::Label(label)
    }
}

/// One filter with ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    params: Vec<(Option<String>, String)>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Add a `key=value` parameter. The value is escaped on render.
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((Some(key.into()), value.to_string()));
        self
    }

    /// Add a positional parameter.
    pub fn positional(mut self, value: impl ToString) -> Self {
        self.params.push((None, value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (unescaped) value of a keyed parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            if let Some(key) = key {
                write!(f, "{}=", key)?;
            }
            f.write_str(&escape_value(value))?;
        }
        Ok(())
    }
}

/// A filter chain with its input and output pads.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    inputs: Vec<StreamRef>,
    filters: Vec<Filter>,
    outputs: Vec<Label>,
}

impl FilterNode {
    pub fn inputs(&self) -> &[StreamRef] {
        &self.inputs
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn outputs(&self) -> &[Label] {
        &self.outputs
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            f.write_str(&input.pad())?;
        }
        let chain: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        f.write_str(&chain.join(","))?;
        for output in &self.outputs {
            write!(f, "{}", output)?;
        }
        Ok(())
    }
}

/// Filter graph under construction.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    input_count: usize,
    nodes: Vec<FilterNode>,
    names: HashSet<String>,
}

impl FilterGraph {
    /// Create a graph over `input_count` external inputs.
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            nodes: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Reference the first stream of `kind` in input `index`.
    pub fn input(&self, index: usize, kind: MediaKind) -> StreamRef {
        StreamRef::Input { index, kind }
    }

    /// Append a chain with one output pad.
    pub fn chain(
        &mut self,
        inputs: Vec<StreamRef>,
        filters: Vec<Filter>,
        hint: &str,
        kind: MediaKind,
    ) -> Label {
        let label = self.allocate(hint, kind);
        self.nodes.push(FilterNode {
            inputs,
            filters,
            outputs: vec![label.clone()],
        });
        label
    }

    /// Append a chain with several output pads of the same kind.
    pub fn fan_out(
        &mut self,
        inputs: Vec<StreamRef>,
        filters: Vec<Filter>,
        hints: &[&str],
        kind: MediaKind,
    ) -> Vec<Label> {
        let labels: Vec<Label> = hints.iter().map(|h| self.allocate(h, kind)).collect();
        self.nodes.push(FilterNode {
            inputs,
            filters,
            outputs: labels.clone(),
        });
        labels
    }

    fn allocate(&mut self, hint: &str, kind: MediaKind) -> Label {
        let base: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let base = if base.is_empty() { "n".to_string() } else { base };

        let mut name = base.clone();
        let mut suffix = 2;
        while self.names.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.names.insert(name.clone());

        Label { name, kind }
    }

    /// Check the wiring against the streams that will be mapped to the output.
    ///
    /// Every consumed label has exactly one earlier producer, every produced
    /// label is consumed exactly once (by a node or by an output mapping),
    /// input indices exist, and at most one output per media kind remains.
    pub fn validate(&self, outputs: &[StreamRef]) -> MediaResult<()> {
        if outputs.is_empty() {
            return Err(MediaError::invalid_graph("graph has no mapped output"));
        }

        let mut kinds = HashSet::new();
        for out in outputs {
            if !kinds.insert(out.kind()) {
                return Err(MediaError::invalid_graph(format!(
                    "more than one final {:?} output",
                    out.kind()
                )));
            }
        }

        let mut produced: HashMap<&str, usize> = HashMap::new();
        let mut consumed: HashSet<String> = HashSet::new();

        for (i, node) in self.nodes.iter().enumerate() {
            if node.filters.is_empty() {
                return Err(MediaError::invalid_graph(format!("node {} has no filters", i)));
            }
            for input in &node.inputs {
                self.consume(input, &produced, &mut consumed)?;
            }
            for output in &node.outputs {
                if produced.insert(output.name(), i).is_some() {
                    return Err(MediaError::invalid_graph(format!(
                        "label {} produced twice",
                        output
                    )));
                }
            }
        }

        for out in outputs {
            self.consume(out, &produced, &mut consumed)?;
        }

        if let Some(dangling) = produced.keys().find(|name| !consumed.contains(**name)) {
            return Err(MediaError::invalid_graph(format!(
                "label [{}] is produced but never consumed",
                dangling
            )));
        }

        Ok(())
    }

    fn consume(
        &self,
        stream: &StreamRef,
        produced: &HashMap<&str, usize>,
        consumed: &mut HashSet<String>,
    ) -> MediaResult<()> {
        match stream {
            StreamRef::Input { index, .. } => {
                if *index >= self.input_count {
                    return Err(MediaError::invalid_graph(format!(
                        "input index {} out of range ({} inputs)",
                        index, self.input_count
                    )));
                }
            }
            StreamRef::Label(label) => {
                if !produced.contains_key(label.name()) {
                    return Err(MediaError::invalid_graph(format!(
                        "label {} consumed before it is produced",
                        label
                    )));
                }
                if !consumed.insert(label.name().to_string()) {
                    return Err(MediaError::invalid_graph(format!(
                        "label {} consumed more than once",
                        label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and freeze the graph.
    pub fn finish(self, outputs: Vec<StreamRef>) -> MediaResult<CompiledGraph> {
        self.validate(&outputs)?;
        let description = self.to_string();
        Ok(CompiledGraph {
            graph: self,
            outputs,
            description,
        })
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        f.write_str(&nodes.join(";"))
    }
}

/// A validated graph and the streams to map to the output file.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    graph: FilterGraph,
    outputs: Vec<StreamRef>,
    description: String,
}

impl CompiledGraph {
    /// `-filter_complex` argument. Empty when no node is needed.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &[StreamRef] {
        &self.outputs
    }

    /// Final output of the given kind.
    pub fn output(&self, kind: MediaKind) -> Option<&StreamRef> {
        self.outputs.iter().find(|o| o.kind() == kind)
    }
}

/// Escape a parameter value for both FFmpeg parsing levels.
///
/// First the option level (`\`, `'`, `:`), then the graph level
/// (`\`, `'`, `[`, `]`, `,`, `;`).
pub fn escape_value(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Normalize a filesystem path for use as a filter parameter value.
///
/// Backslashes become forward slashes so Windows paths survive escaping.
pub fn filter_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_expression_commas() {
        assert_eq!(escape_value("between(t,0,2.5)"), r"between(t\,0\,2.5)");
        assert_eq!(escape_value("720"), "720");
    }

    #[test]
    fn test_escape_two_levels() {
        // Matches the FFmpeg filtergraph documentation example
        assert_eq!(escape_value("a 'b': c, d"), r"a \\\'b\\\'\\: c\, d");
        assert_eq!(escape_value("C:/subs/sub.ass"), r"C\\:/subs/sub.ass");
    }

    #[test]
    fn test_filter_render() {
        let filter = Filter::new("scale").arg("w", 720).arg("h", -2);
        assert_eq!(filter.to_string(), "scale=w=720:h=-2");
        assert_eq!(Filter::new("asplit").positional(2).to_string(), "asplit=2");
        assert_eq!(Filter::new("setsar").positional(1).to_string(), "setsar=1");
        assert_eq!(filter.param("h"), Some("-2"));
    }

    #[test]
    fn test_label_allocation_unique() {
        let mut graph = FilterGraph::new(1);
        let input = graph.input(0, MediaKind::Video);
        let a = graph.chain(vec![input.clone()], vec![Filter::new("null")], "v", MediaKind::Video);
        let b = graph.chain(vec![a.clone().into()], vec![Filter::new("null")], "v", MediaKind::Video);
        let c = graph.chain(vec![b.clone().into()], vec![Filter::new("null")], "v out", MediaKind::Video);
        assert_eq!(a.name(), "v");
        assert_eq!(b.name(), "v_2");
        assert_eq!(c.name(), "v_out");
    }

    #[test]
    fn test_render_chain() {
        let mut graph = FilterGraph::new(1);
        let input = graph.input(0, MediaKind::Audio);
        let out = graph.chain(
            vec![input],
            vec![Filter::new("volume").positional(1.5), Filter::new("aresample").positional(48000)],
            "aout",
            MediaKind::Audio,
        );
        let compiled = graph.finish(vec![out.into()]).unwrap();
        assert_eq!(compiled.description(), "[0:a]volume=1.5,aresample=48000[aout]");
        assert_eq!(compiled.output(MediaKind::Audio).unwrap().map_arg(), "[aout]");
    }

    #[test]
    fn test_dangling_label_rejected() {
        let mut graph = FilterGraph::new(1);
        let input = graph.input(0, MediaKind::Audio);
        let labels = graph.fan_out(vec![input], vec![Filter::new("asplit").positional(2)], &["a", "b"], MediaKind::Audio);
        let err = graph.finish(vec![labels[0].clone().into()]).unwrap_err();
        assert!(err.to_string().contains("[b]"));
    }

    #[test]
    fn test_double_consumption_rejected() {
        let mut graph = FilterGraph::new(1);
        let input = graph.input(0, MediaKind::Video);
        let a = graph.chain(vec![input], vec![Filter::new("null")], "a", MediaKind::Video);
        let b = graph.chain(vec![a.clone().into()], vec![Filter::new("null")], "b", MediaKind::Video);
        let _c = graph.chain(vec![a.into()], vec![Filter::new("null")], "c", MediaKind::Video);
        assert!(graph.validate(&[b.into()]).is_err());
    }

    #[test]
    fn test_foreign_label_rejected() {
        let mut other = FilterGraph::new(1);
        let source = other.input(0, MediaKind::Video);
        let foreign = other.chain(vec![source], vec![Filter::new("null")], "x", MediaKind::Video);

        let mut graph = FilterGraph::new(1);
        let out = graph.chain(vec![foreign.into()], vec![Filter::new("null")], "y", MediaKind::Video);
        let err = graph.finish(vec![out.into()]).unwrap_err();
        assert!(err.to_string().contains("before it is produced"));
    }

    #[test]
    fn test_input_index_checked() {
        let mut graph = FilterGraph::new(1);
        let bad = graph.input(3, MediaKind::Video);
        let out = graph.chain(vec![bad], vec![Filter::new("null")], "v", MediaKind::Video);
        assert!(graph.finish(vec![out.into()]).is_err());
    }

    #[test]
    fn test_two_outputs_same_kind_rejected() {
        let graph = FilterGraph::new(2);
        let a = graph.input(0, MediaKind::Video);
        let b = graph.input(1, MediaKind::Video);
        assert!(graph.validate(&[a, b]).is_err());
    }

    #[test]
    fn test_direct_input_mapping() {
        let graph = FilterGraph::new(1);
        let video = graph.input(0, MediaKind::Video);
        assert_eq!(video.map_arg(), "0:v:0");
        let compiled = graph.finish(vec![video]).unwrap();
        assert_eq!(compiled.description(), "");
    }
}
