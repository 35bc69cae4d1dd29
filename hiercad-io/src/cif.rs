//! CIF (Caltech Intermediate Form) compiler.
//!
//! Serializes a [Reference]/[Node](hiercad_core::Node) graph to CIF text, emitting
//! each distinct shared fragment once as a `DS`/`DF` subroutine and calling it with `C`.
//!
//! ## Output
//! ```text
//! DS <n> 1 1;                   define routine n
//! L <layer>;                    switch layer
//! P <x0> <y0> <x1> <y1> ...;    polygon
//! C <n>[ MY][ R <c> <s>][ T <x> <y>];
//! DF;
//! C <root>;
//! E
//! ```
//!
//! Routines are keyed by Node identity ([NodeKey]) and the layer map in effect,
//! never by content. Bodies are built with placeholder calls that are resolved by
//! an explicit worklist, one pass at a time, until a pass defines no new routine.
//! An edge whose composed transform scales or shears cannot be a call; its geometry
//! is flattened inline at that call site ("steamrolled"), or rejected in strict mode.
//! Steamrolled geometry never enters the routine cache.

use std::collections::{HashMap, VecDeque};
use std::io;
use thiserror::Error;

use hiercad_core::{
    LayerGeometry, LayerMap, Layout, LayoutError, NodeKey, Polygon, Reference, Transform,
};

use crate::settings::CifSettings;

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CifError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transform of '{edge}' cannot be expressed as a CIF call (scale {sx} x {sy}, shear {shear})")]
    Unrepresentable {
        edge: String,
        sx: f64,
        sy: f64,
        shear: f64,
    },
}

// ── Public interface ──────────────────────────────────────────────────

/// The design to compile: a bare Node, or a Reference whose transform and layer map apply on top.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Node(NodeKey),
    Reference(&'a Reference),
}

impl From<NodeKey> for Subject<'_> {
    fn from(key: NodeKey) -> Self {
        Subject::Node(key)
    }
}

impl<'a> From<&'a Reference> for Subject<'a> {
    fn from(r: &'a Reference) -> Self {
        Subject::Reference(r)
    }
}

/// Statistics of one compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CifSummary {
    /// Subroutine definitions emitted.
    pub routines: usize,
    /// Edges flattened in place instead of called.
    pub inline_expansions: usize,
    /// Worklist passes, including the final one that defined nothing.
    pub passes: usize,
}

/// Compile `subject` to CIF text.
pub fn compile<'a>(
    layout: &Layout,
    subject: impl Into<Subject<'a>>,
    settings: &CifSettings,
) -> Result<String, CifError> {
    let (text, _) = Compiler::new(layout, settings).compile(subject.into())?;
    Ok(text)
}

pub struct CifWriter<W: io::Write> {
    writer: W,
    settings: CifSettings,
}

impl<W: io::Write> CifWriter<W> {
    pub fn new(writer: W, settings: CifSettings) -> Self {
        Self { writer, settings }
    }

    /// Compile `subject` and write the complete text.
    pub fn write<'a>(
        &mut self,
        layout: &Layout,
        subject: impl Into<Subject<'a>>,
    ) -> Result<CifSummary, CifError> {
        let (text, summary) = Compiler::new(layout, &self.settings).compile(subject.into())?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(summary)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Compiler ──────────────────────────────────────────────────────────

/// Identity of a routine: the Node, and the layer renaming baked into its body.
type RoutineKey = (NodeKey, LayerMap);

#[derive(Debug)]
struct PendingCall {
    key: RoutineKey,
    transform: Transform,
}

#[derive(Debug)]
enum Line {
    Text(String),
    /// Call whose routine number is not yet known.
    Pending(PendingCall),
}

/// Location of a pending call.
#[derive(Debug, Clone, Copy)]
enum Site {
    Top(usize),
    Body { routine: usize, line: usize },
}

struct Compiler<'a> {
    layout: &'a Layout,
    settings: &'a CifSettings,
    /// Routine `n` lives at index `n - 1`.
    routines: Vec<Vec<Line>>,
    /// Trailing calls after the definitions.
    top: Vec<Line>,
    /// Non-owning: keys are arena indices and never keep a fragment alive.
    cache: HashMap<RoutineKey, u32>,
    fixups: VecDeque<Site>,
    summary: CifSummary,
}

impl<'a> Compiler<'a> {
    fn new(layout: &'a Layout, settings: &'a CifSettings) -> Self {
        Self {
            layout,
            settings,
            routines: Vec::new(),
            top: Vec::new(),
            cache: HashMap::new(),
            fixups: VecDeque::new(),
            summary: CifSummary::default(),
        }
    }

    fn compile(mut self, subject: Subject<'_>) -> Result<(String, CifSummary), CifError> {
        self.seed(subject)?;
        self.run()?;
        self.summary.routines = self.routines.len();
        log::info!(
            "Compiled '{}' to CIF: {} routines, {} inline expansions, {} passes",
            self.layout.name,
            self.summary.routines,
            self.summary.inline_expansions,
            self.summary.passes
        );
        Ok((self.render(), self.summary))
    }

    fn seed(&mut self, subject: Subject<'_>) -> Result<(), CifError> {
        match subject {
            Subject::Node(key) => {
                self.layout.node(key)?;
                self.top.push(Line::Pending(PendingCall {
                    key: (key, LayerMap::Identity),
                    transform: Transform::identity(),
                }));
            }
            Subject::Reference(reference) => {
                let mut lines = Vec::new();
                self.edge(&mut lines, reference, &LayerMap::Identity, "<root>")?;
                if matches!(lines.as_slice(), [Line::Pending(_)]) {
                    self.top = lines;
                } else {
                    // Steamrolled root: its inline geometry gets a routine of its own.
                    let number = self.allocate();
                    self.install(number, lines);
                    self.top.push(Line::Text(format!("C {number};")));
                }
            }
        }
        for (i, line) in self.top.iter().enumerate() {
            if matches!(line, Line::Pending(_)) {
                self.fixups.push_back(Site::Top(i));
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), CifError> {
        loop {
            self.summary.passes += 1;
            let defined = self.routines.len();
            let pending: Vec<Site> = self.fixups.drain(..).collect();
            for site in pending {
                self.resolve(site)?;
            }
            let new = self.routines.len() - defined;
            log::debug!("Pass {}: {} new routines", self.summary.passes, new);
            if new == 0 {
                return Ok(());
            }
        }
    }

    fn slot(&mut self, site: Site) -> &mut Line {
        match site {
            Site::Top(i) => &mut self.top[i],
            Site::Body { routine, line } => &mut self.routines[routine][line],
        }
    }

    fn resolve(&mut self, site: Site) -> Result<(), CifError> {
        let call = match std::mem::replace(self.slot(site), Line::Text(String::new())) {
            Line::Pending(call) => call,
            text => {
                *self.slot(site) = text;
                return Ok(());
            }
        };
        let cached = self.cache.get(&call.key).copied();
        let number = match cached {
            Some(number) => number,
            None => self.define(call.key)?,
        };
        let text = self.call_text(number, &call.transform);
        *self.slot(site) = Line::Text(text);
        Ok(())
    }

    fn allocate(&mut self) -> u32 {
        self.routines.push(Vec::new());
        self.routines.len() as u32
    }

    fn install(&mut self, number: u32, body: Vec<Line>) {
        let routine = number as usize - 1;
        for (line, entry) in body.iter().enumerate() {
            if matches!(entry, Line::Pending(_)) {
                self.fixups.push_back(Site::Body { routine, line });
            }
        }
        self.routines[routine] = body;
    }

    fn define(&mut self, key: RoutineKey) -> Result<u32, CifError> {
        let number = self.allocate();
        log::debug!("Routine {number}: node {:?}", key.0);
        self.cache.insert(key.clone(), number);
        let body = self.expand(&key)?;
        self.install(number, body);
        Ok(number)
    }

    fn expand(&mut self, key: &RoutineKey) -> Result<Vec<Line>, CifError> {
        let (node_key, layer_map) = key;
        let layout = self.layout;
        let node = layout.node(*node_key)?;
        let mut body = Vec::new();
        self.emit_geometry(&mut body, node.geometry(), layer_map)?;
        for (name, child) in node.children() {
            self.edge(&mut body, child, layer_map, name)?;
        }
        Ok(body)
    }

    /// Emit one edge: a call when the whole stack composes to a native transform,
    /// otherwise this use's own inline geometry.
    fn edge(
        &mut self,
        body: &mut Vec<Line>,
        reference: &Reference,
        layer_map: &LayerMap,
        name: &str,
    ) -> Result<(), CifError> {
        let layout = self.layout;
        let transform = reference.flat_transform(layout, None)?;
        if transform.is_native() {
            let node = reference.resolve(layout)?;
            let map = reference.flat_layer_map(layout, None)?.compose(layer_map)?;
            body.push(Line::Pending(PendingCall {
                key: (node, map),
                transform,
            }));
            return Ok(());
        }

        let (sx, sy) = transform.scale_factors();
        let shear = transform.shear_factor();
        if self.settings.strict {
            return Err(CifError::Unrepresentable {
                edge: name.to_string(),
                sx,
                sy,
                shear,
            });
        }
        log::debug!("Steamrolling '{name}': scale {sx} x {sy}, shear {shear}");
        let flat = reference.flatten(layout)?;
        self.emit_geometry(body, &flat.geometry, layer_map)?;
        self.summary.inline_expansions += 1;
        Ok(())
    }

    fn emit_geometry(
        &self,
        body: &mut Vec<Line>,
        geometry: &LayerGeometry,
        layer_map: &LayerMap,
    ) -> Result<(), CifError> {
        for (layer, polygons) in geometry {
            if polygons.iter().all(|p| p.points.is_empty()) {
                continue;
            }
            let Some(dest) = layer_map.lookup(layer)? else {
                continue;
            };
            body.push(Line::Text(format!("L {dest};")));
            for polygon in polygons.iter().filter(|p| !p.points.is_empty()) {
                body.push(Line::Text(self.polygon_text(polygon)));
            }
        }
        Ok(())
    }

    fn polygon_text(&self, polygon: &Polygon) -> String {
        let m = self.settings.multiplier;
        let coords: Vec<String> = polygon
            .points
            .iter()
            .flat_map(|p| [quantize(p.x, m), quantize(p.y, m)])
            .map(|v| v.to_string())
            .collect();
        format!("P {};", coords.join(" "))
    }

    fn call_text(&self, number: u32, transform: &Transform) -> String {
        let mut text = format!("C {number}");
        if transform.does_flip() {
            text.push_str(" MY");
        }
        if transform.does_rotate() {
            let k = self.settings.rotation_multiplier;
            let theta = transform.rotation();
            text.push_str(&format!(
                " R {} {}",
                quantize(theta.cos(), k),
                quantize(theta.sin(), k)
            ));
        }
        if transform.does_translate() {
            let m = self.settings.multiplier;
            let offset = transform.translation();
            text.push_str(&format!(
                " T {} {}",
                quantize(offset.x, m),
                quantize(offset.y, m)
            ));
        }
        text.push(';');
        text
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (i, body) in self.routines.iter().enumerate() {
            out.push_str(&format!("DS {} 1 1;\n", i + 1));
            write_lines(&mut out, body);
            out.push_str("DF;\n");
        }
        write_lines(&mut out, &self.top);
        out.push_str("E\n");
        out
    }
}

fn write_lines(out: &mut String, lines: &[Line]) {
    for line in lines {
        if let Line::Text(text) = line {
            out.push_str(text);
            out.push('\n');
        }
    }
}

/// Scale and truncate toward zero.
fn quantize(value: f64, multiplier: f64) -> i64 {
    (value * multiplier) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiercad_core::{Node, Point};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn rect(layout: &mut Layout) -> NodeKey {
        layout
            .add_node(Node::builder("rect").polygon("metal1", Polygon::rect(0.0, 0.0, 10.0, 20.0)))
            .unwrap()
    }

    fn count(cif: &str, line: &str) -> usize {
        cif.lines().filter(|l| *l == line).count()
    }

    fn count_prefix(cif: &str, prefix: &str) -> usize {
        cif.lines().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn test_translated_rectangle() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let r = Reference::wrap(key).with_transform(Transform::translate(5.0, 5.0).then_rotate(0.0));
        let cif = compile(&layout, &r, &CifSettings::default()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nL metal1;\nP 0 0 10 0 10 20 0 20;\nDF;\nC 1 T 5 5;\nE\n"
        );
    }

    #[test]
    fn test_scaled_root_strict_and_default() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let r = Reference::wrap(key).with_transform(Transform::uniform_scale(2.0));

        let err = compile(&layout, &r, &CifSettings::default().strict()).unwrap_err();
        assert!(matches!(err, CifError::Unrepresentable { ref edge, sx, .. } if edge == "<root>" && (sx - 2.0).abs() < 1e-9));

        let cif = compile(&layout, &r, &CifSettings::default()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nL metal1;\nP 0 0 20 0 20 40 0 40;\nDF;\nC 1;\nE\n"
        );
    }

    #[test]
    fn test_shared_node_defined_once() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::wrap(key))
                    .unwrap()
                    .child(
                        "b",
                        Reference::wrap(key).with_transform(Transform::rotate(90.0).then_translate(30.0, 0.0)),
                    )
                    .unwrap(),
            )
            .unwrap();
        let cif = compile(&layout, top, &CifSettings::default()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nC 2;\nC 2 R 0 1000 T 30 0;\nDF;\n\
             DS 2 1 1;\nL metal1;\nP 0 0 10 0 10 20 0 20;\nDF;\n\
             C 1;\nE\n"
        );
        assert_eq!(count(&cif, "P 0 0 10 0 10 20 0 20;"), 1);
        assert_eq!(count_prefix(&cif, "C 2"), 2);
    }

    #[test]
    fn test_scaled_use_is_not_merged() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::wrap(key).with_transform(Transform::translate(100.0, 0.0)))
                    .unwrap()
                    .child("b", Reference::wrap(key).with_transform(Transform::uniform_scale(2.0)))
                    .unwrap(),
            )
            .unwrap();

        let mut buffer = Vec::new();
        let summary = CifWriter::new(&mut buffer, CifSettings::default())
            .write(&layout, top)
            .unwrap();
        let cif = String::from_utf8(buffer).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nC 2 T 100 0;\nL metal1;\nP 0 0 20 0 20 40 0 40;\nDF;\n\
             DS 2 1 1;\nL metal1;\nP 0 0 10 0 10 20 0 20;\nDF;\n\
             C 1;\nE\n"
        );
        assert_eq!(summary.routines, 2);
        assert_eq!(summary.inline_expansions, 1);

        let err = compile(&layout, top, &CifSettings::default().strict()).unwrap_err();
        assert!(matches!(err, CifError::Unrepresentable { ref edge, .. } if edge == "b"));
    }

    #[test]
    fn test_sheared_edge() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("s", Reference::wrap(key).with_transform(Transform::shear(0.5)))
                    .unwrap(),
            )
            .unwrap();

        let err = compile(&layout, top, &CifSettings::default().strict()).unwrap_err();
        assert!(matches!(
            err,
            CifError::Unrepresentable { ref edge, sx, sy, shear }
                if edge == "s" && (sx - 1.0).abs() < 1e-9 && (sy - 1.0).abs() < 1e-9 && (shear - 0.5).abs() < 1e-9
        ));

        let cif = compile(&layout, top, &CifSettings::default()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nL metal1;\nP 0 0 10 0 20 20 10 20;\nDF;\nC 1;\nE\n"
        );
    }

    #[test]
    fn test_routine_numbers_distinct_from_one() {
        init();
        let mut layout = Layout::new("test");
        let leaf = rect(&mut layout);
        let mid1 = layout
            .add_node(
                Node::builder("mid1")
                    .child("l0", Reference::wrap(leaf))
                    .unwrap()
                    .child("l1", Reference::wrap(leaf).with_transform(Transform::translate(20.0, 0.0)))
                    .unwrap(),
            )
            .unwrap();
        let mid2 = layout
            .add_node(
                Node::builder("mid2")
                    .polygon("poly", Polygon::rect(0.0, 0.0, 1.0, 1.0))
                    .child("m", Reference::wrap(mid1).with_transform(Transform::rotate(180.0)))
                    .unwrap()
                    .child("l", Reference::wrap(leaf))
                    .unwrap(),
            )
            .unwrap();
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::wrap(mid1))
                    .unwrap()
                    .child("b", Reference::wrap(mid2).with_transform(Transform::translate(0.0, 100.0)))
                    .unwrap()
                    .child("c", Reference::wrap(leaf).with_transform(Transform::uniform_scale(3.0)))
                    .unwrap(),
            )
            .unwrap();
        let cif = compile(&layout, top, &CifSettings::default()).unwrap();

        let defined: Vec<u32> = cif
            .lines()
            .filter_map(|l| l.strip_prefix("DS "))
            .map(|rest| rest.split(' ').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(defined, vec![1, 2, 3, 4]);

        let called: Vec<u32> = cif
            .lines()
            .filter_map(|l| l.strip_prefix("C "))
            .map(|rest| rest.trim_end_matches(';').split(' ').next().unwrap().parse().unwrap())
            .collect();
        assert!(called.iter().all(|n| defined.contains(n)));
        assert_eq!(cif.lines().last(), Some("E"));
    }

    #[test]
    fn test_deep_nesting_is_iterative() {
        init();
        let mut layout = Layout::new("deep");
        let mut key = rect(&mut layout);
        for i in 0..300 {
            key = layout
                .add_node(
                    Node::builder(&format!("level{i}"))
                        .child("c", Reference::wrap(key).with_transform(Transform::translate(1.0, 0.0)))
                        .unwrap(),
                )
                .unwrap();
        }
        let mut buffer = Vec::new();
        let summary = CifWriter::new(&mut buffer, CifSettings::default())
            .write(&layout, key)
            .unwrap();
        assert_eq!(summary.routines, 301);
        assert_eq!(summary.passes, 302);
        assert_eq!(summary.inline_expansions, 0);
    }

    #[test]
    fn test_layer_maps_split_routines() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::wrap(key))
                    .unwrap()
                    .child("b", Reference::wrap(key).with_layer_map(LayerMap::rename("metal1", "M2")))
                    .unwrap()
                    .child("c", Reference::wrap(key).with_transform(Transform::translate(0.0, 50.0)))
                    .unwrap()
                    .child("d", Reference::wrap(key).with_layer_map(LayerMap::table([("metal1", None::<&str>)])))
                    .unwrap(),
            )
            .unwrap();
        let cif = compile(&layout, top, &CifSettings::default()).unwrap();
        assert_eq!(count_prefix(&cif, "DS "), 4);
        assert_eq!(count(&cif, "L M2;"), 1);
        assert_eq!(count(&cif, "C 2;"), 1);
        assert_eq!(count(&cif, "C 2 T 0 50;"), 1);
        // The discarding use gets an empty routine.
        assert!(cif.contains("DS 4 1 1;\nDF;\n"));
    }

    #[test]
    fn test_stacked_scaled_uses_expand_independently() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let scaled = layout
            .add_reference(Reference::wrap(key).with_transform(Transform::uniform_scale(2.0)))
            .unwrap();
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::stack_on(scaled))
                    .unwrap()
                    .child("b", Reference::stack_on(scaled).with_transform(Transform::translate(50.0, 0.0)))
                    .unwrap(),
            )
            .unwrap();
        let summary = CifWriter::new(Vec::new(), CifSettings::default())
            .write(&layout, top)
            .unwrap();
        assert_eq!(summary.routines, 1);
        assert_eq!(summary.inline_expansions, 2);

        let mut writer = CifWriter::new(Vec::new(), CifSettings::default());
        writer.write(&layout, top).unwrap();
        let cif = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nL metal1;\nP 0 0 20 0 20 40 0 40;\n\
             L metal1;\nP 50 0 70 0 70 40 50 40;\nDF;\n\
             C 1;\nE\n"
        );
        assert!(compile(&layout, top, &CifSettings::default().strict()).is_err());
    }

    #[test]
    fn test_native_stack_calls_node_directly() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let half = layout
            .add_reference(Reference::wrap(key).with_transform(Transform::uniform_scale(0.5)))
            .unwrap();
        let r = Reference::stack_on(half).with_transform(Transform::uniform_scale(2.0));
        let cif = compile(&layout, &r, &CifSettings::default().strict()).unwrap();
        assert_eq!(
            cif,
            "DS 1 1 1;\nL metal1;\nP 0 0 10 0 10 20 0 20;\nDF;\nC 1;\nE\n"
        );
    }

    #[test]
    fn test_shared_native_stack_reuses_node_routine() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let turned = layout
            .add_reference(Reference::wrap(key).with_transform(Transform::rotate(90.0)))
            .unwrap();
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("a", Reference::stack_on(turned))
                    .unwrap()
                    .child("b", Reference::stack_on(turned).with_transform(Transform::translate(50.0, 0.0)))
                    .unwrap(),
            )
            .unwrap();
        let mut buffer = Vec::new();
        let summary = CifWriter::new(&mut buffer, CifSettings::default().strict())
            .write(&layout, top)
            .unwrap();
        let cif = String::from_utf8(buffer).unwrap();
        assert_eq!(summary.routines, 2);
        assert_eq!(summary.inline_expansions, 0);
        assert_eq!(count(&cif, "C 2 R 0 1000;"), 1);
        assert_eq!(count(&cif, "C 2 R 0 1000 T 50 0;"), 1);
    }

    #[test]
    fn test_mirrored_calls() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let top = layout
            .add_node(
                Node::builder("top")
                    .child("x", Reference::wrap(key).with_transform(Transform::flip_x().then_translate(0.0, 40.0)))
                    .unwrap()
                    .child("y", Reference::wrap(key).with_transform(Transform::flip_y()))
                    .unwrap(),
            )
            .unwrap();
        let cif = compile(&layout, top, &CifSettings::default().strict()).unwrap();
        assert_eq!(count(&cif, "C 2 MY T 0 40;"), 1);
        assert_eq!(count(&cif, "C 2 MY R -1000 0;"), 1);
    }

    #[test]
    fn test_multiplier_truncates() {
        init();
        let mut layout = Layout::new("test");
        let key = layout
            .add_node(Node::builder("tri").polygon(
                "m1",
                Polygon::new(vec![
                    Point::new(0.25, -0.25),
                    Point::new(1.0, 0.0),
                    Point::new(1.0, 1.0),
                ]),
            ))
            .unwrap();
        let cif = compile(&layout, key, &CifSettings::default().with_multiplier(10.0)).unwrap();
        assert_eq!(count(&cif, "P 2 -2 10 0 10 10;"), 1);
    }

    #[test]
    fn test_layout_errors_propagate() {
        init();
        let mut layout = Layout::new("test");
        let key = rect(&mut layout);
        let r = Reference::wrap(key).with_layer_map(LayerMap::rename("other", "x"));
        let err = compile(&layout, &r, &CifSettings::default()).unwrap_err();
        assert!(matches!(err, CifError::Layout(LayoutError::UnknownLayer(_))));

        layout.remove_node(key);
        let err = compile(&layout, key, &CifSettings::default()).unwrap_err();
        assert!(matches!(err, CifError::Layout(LayoutError::StaleKey(_))));
    }
}
