//! Render function generation.
//!
//! Emits the Vue 2 render-helper form: `_c` creates vnodes, `_v`/`_s`
//! build text, `_e` is the empty node, `_l` renders lists, `_t` renders
//! slot outlets and `_u` resolves scoped slots. User expressions are
//! rewritten to read from `_vm`; helper names inside rewritten snippets
//! are written bare so the rewrite prefixes them too.

use crate::ast::*;
use crate::error::CompileError;
use crate::expression::{parameter_bindings, rewrite_expression};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use sfc_parser::tags::camelize;
use smol_str::SmolStr;
use source_map::{CodeBuilder, SourceMap, SourceMapping, Span};

static FN_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w$_]+|\([^)]*?\))\s*=>|^function(?:\s+[\w$]+)?\s*\(").unwrap());
static FN_INVOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*?\);*$").unwrap());
static SIMPLE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*|\['[^']*?'\]|\["[^"]*?"\]|\[\d+\]|\[[A-Za-z_$][\w$]*\])*$"#)
        .unwrap()
});
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const STATEFUL_PRELUDE: &str =
    "var render = function () {var _vm=this;var _h=_vm.$createElement;var _c=_vm._self._c||_h;return ";
const FUNCTIONAL_PRELUDE: &str = "var render = function (_h,_vm) {var _c=_vm._c;return ";
const EPILOGUE: &str = "}\nvar staticRenderFns = []\n";

/// Generated render code and its map back to template offsets.
#[derive(Debug, Default)]
pub struct Generated {
    pub code: String,
    pub map: SourceMap,
    pub errors: Vec<CompileError>,
}

/// Generate the render module for a validated root.
pub fn generate(root: Option<&TemplateNode>, functional: bool) -> Generated {
    let mut gen = Generator::default();
    gen.out
        .push_str(if functional { FUNCTIONAL_PRELUDE } else { STATEFUL_PRELUDE });
    match root {
        Some(node) => gen.gen_node(node),
        None => gen.out.push_str("_c('div')"),
    }
    gen.out.push_str(EPILOGUE);

    tracing::trace!(errors = gen.errors.len(), "generated render function");

    let (code, map) = gen.out.finish();
    Generated {
        code,
        map,
        errors: gen.errors,
    }
}

/// Render code used when the template failed to compile.
pub fn stub(functional: bool) -> String {
    let prelude = if functional { FUNCTIONAL_PRELUDE } else { STATEFUL_PRELUDE };
    format!("{}_vm._e(){}", prelude, EPILOGUE)
}

/// Script text built around template expressions, with a map from its
/// offsets to template offsets.
#[derive(Debug, Clone, Default)]
struct Js {
    text: String,
    map: SourceMap,
    origin: Option<Expression>,
}

impl Js {
    fn new(raw: &str) -> Self {
        let mut js = Self::default();
        js.raw(raw);
        js
    }

    fn of(expr: &Expression) -> Self {
        let mut js = Self::default();
        js.expr(expr);
        js
    }

    fn raw(&mut self, raw: &str) -> &mut Self {
        self.text.push_str(raw);
        self
    }

    fn expr(&mut self, expr: &Expression) -> &mut Self {
        let at = self.text.len() as u32;
        let len = expr.content.len() as u32;
        self.text.push_str(&expr.content);
        if len == expr.span.len() {
            self.map.add(at, expr.span.start, len);
        } else {
            self.map.add_mapping(SourceMapping::new_with_lengths(
                at,
                len,
                expr.span.start,
                expr.span.len(),
            ));
        }
        if self.origin.is_none() {
            self.origin = Some(expr.clone());
        }
        self
    }

    fn append(&mut self, other: &Js) -> &mut Self {
        let delta = self.text.len() as u32;
        self.text.push_str(&other.text);
        self.map.merge(&other.map.shift_generated(delta));
        if self.origin.is_none() {
            self.origin = other.origin.clone();
        }
        self
    }
}

type Chunk = (String, SourceMap);

/// Everything that lands in an element's data object.
#[derive(Default)]
struct ElementData {
    attrs: Vec<(String, Js)>,
    dynamic_attrs: Vec<(Js, Js)>,
    dom_props: Vec<(String, Js)>,
    on: IndexMap<String, Vec<Js>>,
    native_on: IndexMap<String, Vec<Js>>,
    dynamic_on: Vec<(Js, Js)>,
    directives: Vec<Js>,
    model: Option<Js>,
}

#[derive(Default)]
struct Generator {
    out: CodeBuilder,
    /// Names bound by `v-for` aliases and slot scopes, innermost last.
    scope: Vec<SmolStr>,
    in_for: usize,
    errors: Vec<CompileError>,
}

impl Generator {
    /// Run `f` against a fresh builder and return what it wrote.
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> Chunk {
        let saved = std::mem::take(&mut self.out);
        f(self);
        std::mem::replace(&mut self.out, saved).finish()
    }

    fn emit(&mut self, chunk: &Chunk) {
        self.out.append(&chunk.0, &chunk.1);
    }

    fn enter_scope(&self) -> usize {
        self.scope.len()
    }

    fn exit_scope(&mut self, marker: usize) {
        self.scope.truncate(marker);
    }

    fn add_scope_var(&mut self, name: &str, origin: &str) {
        tracing::trace!(name, origin, "template local");
        self.scope.push(name.into());
    }

    /// Rewrite a script snippet against the current scope and emit it.
    fn js(&mut self, js: &Js) {
        let scope = &self.scope;
        let is_local = |name: &str| scope.iter().any(|var| var == name);
        match rewrite_expression(&js.text, &is_local) {
            Ok(rewritten) => {
                let map = rewritten.map.compose(&js.map);
                self.out.append(&rewritten.code, &map);
            }
            Err(reason) => {
                let (raw, span) = match &js.origin {
                    Some(expr) => (expr.content.as_str(), expr.span),
                    None => (js.text.as_str(), Span::new(0, 0)),
                };
                tracing::warn!(raw, %reason, "template expression failed to parse");
                self.errors
                    .push(CompileError::invalid_expression(&reason, raw, span));
                self.out.push_str(&js.text);
            }
        }
    }

    fn gen_node(&mut self, node: &TemplateNode) {
        match node {
            TemplateNode::Element(el) => self.gen_element(el),
            TemplateNode::Text(text) => self.gen_text(text),
            TemplateNode::If(node) => self.gen_if(node),
            TemplateNode::For(node) => self.gen_for(node),
            TemplateNode::SlotOutlet(slot) => self.gen_slot_outlet(slot),
            TemplateNode::Template(template) => self.gen_children_array(&template.children),
            TemplateNode::Comment(_) => self.out.push_str("_vm._e()"),
        }
    }

    fn gen_text(&mut self, text: &TextNode) {
        self.out.push_with_mapping("_vm._v(", text.span.start, 0);
        for (i, part) in text.parts.iter().enumerate() {
            if i > 0 {
                self.out.push('+');
            }
            match part {
                TextPart::Static(s) => self.out.push_str(&quote(s)),
                TextPart::Interpolation(node) => {
                    self.out.push_str("_vm._s(");
                    self.js(&Js::of(&node.expression));
                    self.out.push(')');
                }
            }
        }
        self.out.push(')');
    }

    fn gen_if(&mut self, node: &IfNode) {
        for branch in &node.branches {
            match &branch.condition {
                Some(condition) => {
                    let mut js = Js::default();
                    js.raw("(").expr(condition).raw(")");
                    self.js(&js);
                    self.out.push('?');
                    self.gen_branch(branch);
                    self.out.push(':');
                }
                None => {
                    self.gen_branch(branch);
                    return;
                }
            }
        }
        self.out.push_str("_vm._e()");
    }

    fn gen_branch(&mut self, branch: &IfBranch) {
        match branch.children.first() {
            Some(child) => self.gen_node(child),
            None => self.out.push_str("_vm._e()"),
        }
    }

    fn gen_for(&mut self, node: &ForNode) {
        let mut source = Js::default();
        source.raw("(").expr(&node.source).raw(")");

        self.out.push_str("_vm._l(");
        self.js(&source);
        self.out.push_str(",function(");
        self.out
            .push_mapped(&node.aliases.pattern, node.aliases.span.start);
        self.out.push_str("){return ");

        let marker = self.enter_scope();
        for name in &node.bindings {
            self.add_scope_var(name, "v-for");
        }
        self.in_for += 1;
        match node.children.first() {
            Some(child) => self.gen_node(child),
            None => self.out.push_str("_vm._e()"),
        }
        self.in_for -= 1;
        self.exit_scope(marker);

        self.out.push_str("})");
    }

    fn gen_children_array(&mut self, children: &[TemplateNode]) {
        self.out.push('[');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.gen_node(child);
        }
        self.out.push(']');
    }

    /// Emit `,children[,normalization]` for an element.
    fn gen_children(&mut self, children: &[TemplateNode]) {
        if children.is_empty() {
            return;
        }
        if let [TemplateNode::For(node)] = children {
            if !node.children.iter().any(is_fragment) {
                self.out.push(',');
                self.gen_for(node);
                let component = node.children.iter().any(maybe_component);
                self.out.push_str(if component { ",1" } else { ",0" });
                return;
            }
        }
        self.out.push(',');
        self.gen_children_array(children);
        match normalization_type(children) {
            0 => {}
            n => self.out.push_str(&format!(",{}", n)),
        }
    }

    fn gen_element(&mut self, el: &ElementNode) {
        if el.tag == "template" && el.get_attr("slot").is_none() && el.get_prop("slot").is_none() {
            self.gen_children_array(&el.children);
            return;
        }

        let data = self.gen_data(el);
        self.out.push_str("_c(");
        match (el.get_prop("is"), el.get_attr("is")) {
            (Some(is), _) => self.js(&Js::of(&is.value)),
            (None, Some(is)) => self.out.push_str(&quote(is)),
            (None, None) => {
                let tag = format!("'{}'", el.tag);
                self.out
                    .push_with_mapping(&tag, el.tag_span.start, el.tag_span.len());
            }
        }
        if let Some(data) = &data {
            self.out.push(',');
            self.emit(data);
        }
        self.gen_children(&el.children);
        self.out.push(')');
    }

    fn gen_slot_outlet(&mut self, slot: &SlotOutletNode) {
        self.out.push_str("_vm._t(");
        match &slot.name {
            SlotName::Static(name) => self.out.push_str(&quote(name)),
            SlotName::Dynamic(expr) => self.js(&Js::of(expr)),
        }

        let has_fallback = !slot.fallback.is_empty();
        if has_fallback {
            self.out.push_str(",function(){return ");
            self.gen_children_array(&slot.fallback);
            self.out.push('}');
        }

        let bind = slot.props.iter().find(|p| p.is_object_spread());
        let props: Vec<&Prop> = slot.props.iter().filter(|p| !p.is_object_spread()).collect();
        let has_props = !props.is_empty() || !slot.attrs.is_empty();

        if (has_props || bind.is_some()) && !has_fallback {
            self.out.push_str(",null");
        }
        if has_props {
            self.out.push_str(",{");
            let mut first = true;
            for attr in &slot.attrs {
                if !first {
                    self.out.push(',');
                }
                first = false;
                self.out.push_str(&quote(&camelize(&attr.name)));
                self.out.push(':');
                self.out
                    .push_str(&quote(attr.value.as_deref().unwrap_or("")));
            }
            for prop in props {
                if !first {
                    self.out.push(',');
                }
                first = false;
                self.out.push_str(&quote(&camelize(&prop.name)));
                self.out.push(':');
                self.js(&Js::of(&prop.value));
            }
            self.out.push('}');
        }
        if let Some(bind) = bind {
            if !has_props {
                self.out.push_str(",null");
            }
            self.out.push(',');
            self.js(&Js::of(&bind.value));
        }
        self.out.push(')');
    }

    /// Generate the data object of an element, if it needs one.
    fn gen_data(&mut self, el: &ElementNode) -> Option<Chunk> {
        let data = Self::lower_element(el);
        let mut entries: Vec<Chunk> = Vec::new();

        if !data.directives.is_empty() {
            entries.push(self.capture(|g| {
                g.out.push_str("directives:[");
                for (i, dir) in data.directives.iter().enumerate() {
                    if i > 0 {
                        g.out.push(',');
                    }
                    g.js(dir);
                }
                g.out.push(']');
            }));
        }

        if let Some(key) = el.get_prop("key") {
            entries.push(self.capture(|g| {
                g.out.push_str("key:");
                g.js(&Js::of(&key.value));
            }));
        } else if let Some(key) = el.get_attr("key") {
            entries.push((format!("key:{}", quote(key)), SourceMap::new()));
        }

        let has_ref = if let Some(r) = el.get_prop("ref") {
            entries.push(self.capture(|g| {
                g.out.push_str("ref:");
                g.js(&Js::of(&r.value));
            }));
            true
        } else if let Some(r) = el.get_attr("ref") {
            entries.push((format!("ref:{}", quote(r)), SourceMap::new()));
            true
        } else {
            false
        };
        if has_ref && self.in_for > 0 {
            entries.push(("refInFor:true".into(), SourceMap::new()));
        }

        if el.get_prop("is").is_some() || el.get_attr("is").is_some() {
            entries.push((format!("tag:{}", quote(&el.tag)), SourceMap::new()));
        }

        if let Some(class) = el.get_attr("class") {
            let class = WHITESPACE_RUN.replace_all(class, " ");
            entries.push((format!("staticClass:{}", quote(class.trim())), SourceMap::new()));
        }
        if let Some(class) = el.get_prop("class") {
            entries.push(self.capture(|g| {
                g.out.push_str("class:");
                g.js(&Js::of(&class.value));
            }));
        }
        if let Some(style) = el.get_attr("style") {
            entries.push((format!("staticStyle:{}", static_style(style)), SourceMap::new()));
        }
        if let Some(style) = el.get_prop("style") {
            entries.push(self.capture(|g| {
                g.out.push_str("style:");
                g.js(&Js::of(&style.value));
            }));
        }

        if !data.attrs.is_empty() || !data.dynamic_attrs.is_empty() {
            entries.push(self.capture(|g| {
                g.out.push_str("attrs:");
                g.gen_props_object(&data.attrs, &data.dynamic_attrs);
            }));
        }
        if !data.dom_props.is_empty() {
            entries.push(self.capture(|g| {
                g.out.push_str("domProps:");
                g.gen_props_object(&data.dom_props, &[]);
            }));
        }
        if !data.on.is_empty() || !data.dynamic_on.is_empty() {
            entries.push(self.capture(|g| {
                g.out.push_str("on:");
                g.gen_handlers(&data.on, &data.dynamic_on);
            }));
        }
        if !data.native_on.is_empty() {
            entries.push(self.capture(|g| {
                g.out.push_str("nativeOn:");
                g.gen_handlers(&data.native_on, &[]);
            }));
        }

        if let Some(slot) = el.get_prop("slot") {
            entries.push(self.capture(|g| {
                g.out.push_str("slot:");
                g.js(&Js::of(&slot.value));
            }));
        } else if let Some(slot) = el.get_attr("slot") {
            entries.push((format!("slot:{}", quote(slot)), SourceMap::new()));
        }

        if !el.slots.is_empty() {
            entries.push(self.capture(|g| g.gen_scoped_slots(el)));
        }

        if let Some(model) = &data.model {
            entries.push(self.capture(|g| {
                g.out.push_str("model:");
                g.js(model);
            }));
        }

        let bind = el.props.iter().find(|p| p.is_object_spread());
        let listeners = el.events.iter().find(|e| e.is_object_listener());
        if entries.is_empty() && bind.is_none() && listeners.is_none() {
            return None;
        }

        Some(self.capture(|g| {
            if listeners.is_some() {
                g.out.push_str("_vm._g(");
            }
            if bind.is_some() {
                g.out.push_str("_vm._b(");
            }
            g.out.push('{');
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    g.out.push(',');
                }
                g.emit(entry);
            }
            g.out.push('}');
            if let Some(bind) = bind {
                g.out.push_str(&format!(",'{}',", el.tag));
                g.js(&Js::of(&bind.value));
                if bind.has_modifier("prop") {
                    g.out.push_str(",true");
                }
                g.out.push(')');
            }
            if let Some(listeners) = listeners {
                g.out.push(',');
                g.js(&Js::of(&listeners.handler));
                g.out.push(')');
            }
        }))
    }

    fn gen_props_object(&mut self, statics: &[(String, Js)], dynamics: &[(Js, Js)]) {
        if !dynamics.is_empty() {
            self.out.push_str("_vm._d(");
        }
        self.out.push('{');
        for (i, (name, value)) in statics.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.out.push_str(&quote(name));
            self.out.push(':');
            self.js(value);
        }
        self.out.push('}');
        if !dynamics.is_empty() {
            self.out.push_str(",[");
            for (i, (name, value)) in dynamics.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                self.js(name);
                self.out.push(',');
                self.js(value);
            }
            self.out.push_str("])");
        }
    }

    fn gen_handlers(&mut self, handlers: &IndexMap<String, Vec<Js>>, dynamics: &[(Js, Js)]) {
        if !dynamics.is_empty() {
            self.out.push_str("_vm._d(");
        }
        self.out.push('{');
        for (i, (name, list)) in handlers.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.out.push_str(&quote(name));
            self.out.push(':');
            if let [single] = list.as_slice() {
                self.js(single);
            } else {
                self.out.push('[');
                for (j, handler) in list.iter().enumerate() {
                    if j > 0 {
                        self.out.push(',');
                    }
                    self.js(handler);
                }
                self.out.push(']');
            }
        }
        self.out.push('}');
        if !dynamics.is_empty() {
            self.out.push_str(",[");
            for (i, (name, handler)) in dynamics.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                self.js(name);
                self.out.push(',');
                self.js(handler);
            }
            self.out.push_str("])");
        }
    }

    fn gen_scoped_slots(&mut self, el: &ElementNode) {
        let dynamic = el
            .slots
            .values()
            .any(|slot| matches!(slot.name, SlotName::Dynamic(_)));

        self.out.push_str("scopedSlots:_vm._u([");
        for (i, slot) in el.slots.values().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.out.push_str("{key:");
            match &slot.name {
                SlotName::Static(name) => self.out.push_str(&quote(name)),
                SlotName::Dynamic(expr) => self.js(&Js::of(expr)),
            }
            self.out.push_str(",fn:function(");

            let marker = self.enter_scope();
            if let Some(props) = &slot.props {
                self.out.push_mapped(&props.pattern, props.span.start);
                match parameter_bindings(&props.pattern) {
                    Some(params) => {
                        for name in params.iter().flatten() {
                            self.add_scope_var(name, "slot-props");
                        }
                    }
                    None => self.errors.push(CompileError::invalid_expression(
                        "invalid slot scope",
                        &props.pattern,
                        props.span,
                    )),
                }
            }
            self.out.push_str("){return ");
            if slot.children.is_empty() {
                self.out.push_str("undefined");
            } else {
                self.gen_children_array(&slot.children);
            }
            self.out.push('}');
            self.exit_scope(marker);

            if slot.props.is_none() {
                self.out.push_str(",proxy:true");
            }
            self.out.push('}');
        }
        self.out.push(']');
        if dynamic {
            self.out.push_str(",null,true");
        }
        self.out.push(')');
    }

    /// Collect bindings, listeners and directives of an element into the
    /// shape of its data object.
    fn lower_element(el: &ElementNode) -> ElementData {
        let mut data = ElementData::default();
        let is_component = el.is_component || el.tag == "component";
        let input_type = el.get_attr("type");

        for attr in &el.attrs {
            if matches!(attr.name.as_str(), "class" | "style" | "key" | "ref" | "slot" | "is") {
                continue;
            }
            let value = attr.value.as_deref().unwrap_or("");
            data.attrs.push((attr.name.to_string(), Js::new(&quote(value))));
        }

        for prop in &el.props {
            if prop.is_object_spread() {
                continue;
            }
            if let Some(name_expr) = &prop.name_expr {
                data.dynamic_attrs.push((Js::of(name_expr), Js::of(&prop.value)));
                continue;
            }
            if matches!(prop.name.as_str(), "class" | "style" | "key" | "ref" | "slot" | "is") {
                continue;
            }
            let name = if prop.has_modifier("camel") {
                camelize(&prop.name)
            } else {
                prop.name.to_string()
            };
            let as_prop = prop.has_modifier("prop")
                || (!is_component && must_use_prop(&el.tag, input_type, &name));
            if as_prop {
                data.dom_props.push((name.clone(), Js::of(&prop.value)));
            } else {
                data.attrs.push((name.clone(), Js::of(&prop.value)));
            }

            if prop.has_modifier("sync") {
                let handler = handler_function(&assignment(&prop.value, &Js::new("$event")), &[]);
                let camel = camelize(&prop.name);
                data.on
                    .entry(format!("update:{}", camel))
                    .or_default()
                    .push(handler.clone());
                let kebab = hyphenate(&prop.name);
                if kebab != camel {
                    data.on
                        .entry(format!("update:{}", kebab))
                        .or_default()
                        .push(handler);
                }
            }
        }

        for event in &el.events {
            if event.is_object_listener() {
                continue;
            }
            let mut modifiers = event.modifiers.clone();
            let mut name = event.name.to_string();
            if name == "click" && modifiers.iter().any(|m| m == "right") {
                name = "contextmenu".into();
                modifiers.retain(|m| m != "right");
            } else if name == "click" && modifiers.iter().any(|m| m == "middle") {
                name = "mouseup".into();
            }
            let prefix = event_prefix(&modifiers);
            let handler = handler_function(&Js::of(&event.handler), &modifiers);

            if let Some(name_expr) = &event.name_expr {
                let mut key = Js::default();
                if prefix.is_empty() {
                    key.expr(name_expr);
                } else {
                    key.raw("_p(").expr(name_expr).raw(",").raw(&quote(&prefix)).raw(")");
                }
                data.dynamic_on.push((key, handler));
                continue;
            }

            let target = if modifiers.iter().any(|m| m == "native") {
                &mut data.native_on
            } else {
                &mut data.on
            };
            target
                .entry(format!("{}{}", prefix, name))
                .or_default()
                .push(handler);
        }

        for dir in &el.directives {
            match dir.name.as_str() {
                "html" | "text" => {
                    let prop = if dir.name == "html" { "innerHTML" } else { "textContent" };
                    if let Some(value) = &dir.value {
                        let mut js = Js::default();
                        match dir.name.as_str() {
                            "text" => js.raw("_s(").expr(value).raw(")"),
                            _ => js.raw("(").expr(value).raw(")"),
                        };
                        data.dom_props.push((prop.into(), js));
                    }
                }
                "model" => {
                    let Some(value) = &dir.value else {
                        continue;
                    };
                    if is_component {
                        data.model = Some(component_model(value, &dir.modifiers));
                        continue;
                    }
                    match (el.tag.as_str(), input_type) {
                        ("select", _) => select_model(&mut data, value, &dir.modifiers),
                        ("input", Some("checkbox")) => checkbox_model(&mut data, el, value, &dir.modifiers),
                        ("input", Some("radio")) => radio_model(&mut data, el, value, &dir.modifiers),
                        ("input" | "textarea", _) => text_model(&mut data, input_type, value, &dir.modifiers),
                        _ => {
                            data.model = Some(component_model(value, &dir.modifiers));
                            continue;
                        }
                    }
                    data.directives.push(runtime_directive(dir));
                }
                "slot" | "bind" | "on" => {}
                _ => data.directives.push(runtime_directive(dir)),
            }
        }

        data
    }
}

/// `{name:"show",rawName:"v-show",value:(x),expression:"x"}`
fn runtime_directive(dir: &Directive) -> Js {
    let mut js = Js::default();
    js.raw("{name:")
        .raw(&quote(&dir.name))
        .raw(",rawName:")
        .raw(&quote(&dir.raw_name));
    if let Some(value) = &dir.value {
        js.raw(",value:(")
            .expr(value)
            .raw("),expression:")
            .raw(&quote(&value.content));
    }
    match &dir.arg {
        Some(DirectiveArg::Static(arg, _)) => {
            js.raw(",arg:").raw(&quote(arg));
        }
        Some(DirectiveArg::Dynamic(expr)) => {
            js.raw(",arg:").expr(expr).raw(",isDynamicArg:true");
        }
        None => {}
    }
    if !dir.modifiers.is_empty() {
        js.raw(",modifiers:{");
        for (i, modifier) in dir.modifiers.iter().enumerate() {
            if i > 0 {
                js.raw(",");
            }
            js.raw(&quote(modifier)).raw(":true");
        }
        js.raw("}");
    }
    js.raw("}");
    js
}

fn has(modifiers: &[SmolStr], name: &str) -> bool {
    modifiers.iter().any(|m| m == name)
}

fn component_model(value: &Expression, modifiers: &[SmolStr]) -> Js {
    let mut assigned = Js::new("$$v");
    if has(modifiers, "trim") {
        assigned = Js::new("(typeof $$v === 'string'? $$v.trim(): $$v)");
    }
    if has(modifiers, "number") {
        let mut wrapped = Js::new("_n(");
        wrapped.append(&assigned).raw(")");
        assigned = wrapped;
    }

    let mut js = Js::default();
    js.raw("{value:(")
        .expr(value)
        .raw("),callback:function ($$v) {")
        .append(&assignment(value, &assigned))
        .raw("},expression:")
        .raw(&quote(&value.content))
        .raw("}");
    js
}

fn text_model(data: &mut ElementData, input_type: Option<&str>, value: &Expression, modifiers: &[SmolStr]) {
    let lazy = has(modifiers, "lazy");
    let number = has(modifiers, "number");
    let trim = has(modifiers, "trim");
    let range = input_type == Some("range");

    let event = if lazy {
        "change"
    } else if range {
        "__r"
    } else {
        "input"
    };
    let mut assigned = Js::new(if trim {
        "$event.target.value.trim()"
    } else {
        "$event.target.value"
    });
    if number {
        let mut wrapped = Js::new("_n(");
        wrapped.append(&assigned).raw(")");
        assigned = wrapped;
    }

    let mut code = Js::default();
    if !lazy && !range {
        code.raw("if($event.target.composing)return;");
    }
    code.append(&assignment(value, &assigned));

    let mut prop = Js::default();
    prop.raw("(").expr(value).raw(")");
    data.dom_props.push(("value".into(), prop));
    data.on
        .entry(event.into())
        .or_default()
        .insert(0, handler_function(&code, &[]));
    if trim || number {
        data.on
            .entry("blur".into())
            .or_default()
            .push(handler_function(&Js::new("$forceUpdate()"), &[]));
    }
}

/// The bound or static value of an attribute, as script text.
fn binding_value(el: &ElementNode, name: &str) -> Option<Js> {
    if let Some(prop) = el.get_prop(name) {
        return Some(Js::of(&prop.value));
    }
    el.get_attr(name).map(|value| Js::new(&quote(value)))
}

fn checkbox_model(data: &mut ElementData, el: &ElementNode, value: &Expression, modifiers: &[SmolStr]) {
    let number = has(modifiers, "number");
    let value_binding = binding_value(el, "value").unwrap_or_else(|| Js::new("null"));
    let true_binding = binding_value(el, "true-value");
    let false_binding = binding_value(el, "false-value").unwrap_or_else(|| Js::new("false"));

    let mut checked = Js::default();
    checked
        .raw("Array.isArray(")
        .expr(value)
        .raw(")?_i(")
        .expr(value)
        .raw(",")
        .append(&value_binding)
        .raw(")>-1");
    match &true_binding {
        Some(true_value) => {
            checked.raw(":_q(").expr(value).raw(",").append(true_value).raw(")");
        }
        None => {
            checked.raw(":(").expr(value).raw(")");
        }
    }
    data.dom_props.push(("checked".into(), checked));

    let true_value = true_binding.unwrap_or_else(|| Js::new("true"));
    let mut code = Js::default();
    code.raw("var $$a=")
        .expr(value)
        .raw(",$$el=$event.target,$$c=$$el.checked?(")
        .append(&true_value)
        .raw("):(")
        .append(&false_binding)
        .raw(");if(Array.isArray($$a)){var $$v=");
    if number {
        code.raw("_n(").append(&value_binding).raw(")");
    } else {
        code.append(&value_binding);
    }
    code.raw(",$$i=_i($$a,$$v);if($$el.checked){$$i<0&&(")
        .append(&assignment(value, &Js::new("$$a.concat([$$v])")))
        .raw(")}else{$$i>-1&&(")
        .append(&assignment(
            value,
            &Js::new("$$a.slice(0,$$i).concat($$a.slice($$i+1))"),
        ))
        .raw(")}}else{")
        .append(&assignment(value, &Js::new("$$c")))
        .raw("}");

    data.on
        .entry("change".into())
        .or_default()
        .insert(0, handler_function(&code, &[]));
}

fn radio_model(data: &mut ElementData, el: &ElementNode, value: &Expression, modifiers: &[SmolStr]) {
    let mut value_binding = binding_value(el, "value").unwrap_or_else(|| Js::new("null"));
    if has(modifiers, "number") {
        let mut wrapped = Js::new("_n(");
        wrapped.append(&value_binding).raw(")");
        value_binding = wrapped;
    }

    let mut checked = Js::default();
    checked
        .raw("_q(")
        .expr(value)
        .raw(",")
        .append(&value_binding)
        .raw(")");
    data.dom_props.push(("checked".into(), checked));
    data.on
        .entry("change".into())
        .or_default()
        .insert(0, handler_function(&assignment(value, &value_binding), &[]));
}

fn select_model(data: &mut ElementData, value: &Expression, modifiers: &[SmolStr]) {
    let selected = if has(modifiers, "number") { "_n(val)" } else { "val" };
    let mut code = Js::new(&format!(
        "var $$selectedVal = Array.prototype.filter.call($event.target.options,function(o){{return o.selected}}).map(function(o){{var val = \"_value\" in o ? o._value : o.value;return {}}}); ",
        selected
    ));
    code.append(&assignment(
        value,
        &Js::new("$event.target.multiple ? $$selectedVal : $$selectedVal[0]"),
    ));
    data.on
        .entry("change".into())
        .or_default()
        .insert(0, handler_function(&code, &[]));
}

/// Assign `assigned` to the model expression, going through `$set` for
/// member targets.
fn assignment(target: &Expression, assigned: &Js) -> Js {
    let mut js = Js::default();
    match split_model(&target.content) {
        None => {
            js.expr(target).raw("=").append(assigned);
        }
        Some((object, key)) => {
            js.raw("$set(").expr(&slice_expression(target, object.clone()));
            js.raw(", ");
            match key {
                ModelKey::Name(name) => js.raw(&quote(&target.content[name])),
                ModelKey::Computed(range) => js.expr(&slice_expression(target, range)),
            };
            js.raw(", ").append(assigned).raw(")");
        }
    }
    js
}

enum ModelKey {
    /// `a.b` style key, range of the name.
    Name(std::ops::Range<usize>),
    /// `a[b]` style key, range of the key expression.
    Computed(std::ops::Range<usize>),
}

/// Split `a.b.c` into (`a.b`, `c`) and `a[b]` into (`a`, `b`).
fn split_model(value: &str) -> Option<(std::ops::Range<usize>, ModelKey)> {
    let start = value.len() - value.trim_start().len();
    let end = value.trim_end().len();
    let trimmed = &value[start..end];

    if !trimmed.contains('[') || !trimmed.ends_with(']') {
        let dot = trimmed.rfind('.')?;
        return Some((
            start..start + dot,
            ModelKey::Name(start + dot + 1..end),
        ));
    }

    let mut depth = 0usize;
    for (i, c) in trimmed.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    return Some((
                        start..start + i,
                        ModelKey::Computed(start + i + 1..end - 1),
                    ));
                }
            }
            _ => {}
        }
    }
    None
}

fn slice_expression(expr: &Expression, range: std::ops::Range<usize>) -> Expression {
    let content = expr.content[range.clone()].to_string();
    let span = if expr.content.len() as u32 == expr.span.len() {
        Span::new(
            expr.span.start + range.start as u32,
            expr.span.start + range.end as u32,
        )
    } else {
        expr.span
    };
    Expression::new(content, span)
}

/// Wrap handler code the way the runtime expects: method paths and
/// function expressions are passed through, everything else becomes a
/// function of `$event`.
fn handler_function(code: &Js, modifiers: &[SmolStr]) -> Js {
    let text = code.text.trim();
    if text.is_empty() {
        return Js::new("function(){}");
    }

    let is_method_path = SIMPLE_PATH.is_match(text);
    let is_function_expression = FN_EXPRESSION.is_match(text);
    let is_function_invocation = SIMPLE_PATH.is_match(&FN_INVOCATION.replace(text, ""));
    let guard = modifier_code(modifiers);

    let mut js = Js::default();
    if guard.is_empty() {
        if is_method_path || is_function_expression {
            js.append(code);
            return js;
        }
        js.raw("function($event){");
        if is_function_invocation {
            js.raw("return ");
        }
        js.append(code).raw("}");
        return js;
    }

    js.raw("function($event){").raw(&guard);
    if is_method_path {
        js.raw("return ").append(code).raw(".apply(null, arguments)");
    } else if is_function_expression {
        js.raw("return (").append(code).raw(").apply(null, arguments)");
    } else if is_function_invocation {
        js.raw("return ").append(code);
    } else {
        js.append(code);
    }
    js.raw("}");
    js
}

/// Guard statements for event modifiers.
fn modifier_code(modifiers: &[SmolStr]) -> String {
    let mut keys: Vec<&str> = Vec::new();
    let mut code = String::new();

    for modifier in modifiers {
        match modifier.as_str() {
            "stop" => code.push_str("$event.stopPropagation();"),
            "prevent" => code.push_str("$event.preventDefault();"),
            "self" => code.push_str("if($event.target !== $event.currentTarget)return null;"),
            "ctrl" | "shift" | "alt" | "meta" => {
                code.push_str(&format!("if(!$event.{}Key)return null;", modifier));
            }
            "left" => {
                code.push_str("if('button' in $event && $event.button !== 0)return null;");
                keys.push("left");
            }
            "middle" => code.push_str("if('button' in $event && $event.button !== 1)return null;"),
            "right" => {
                code.push_str("if('button' in $event && $event.button !== 2)return null;");
                keys.push("right");
            }
            "exact" => {
                let others: Vec<String> = ["ctrl", "shift", "alt", "meta"]
                    .iter()
                    .filter(|key| !has(modifiers, key))
                    .map(|key| format!("$event.{}Key", key))
                    .collect();
                if !others.is_empty() {
                    code.push_str(&format!("if({})return null;", others.join("||")));
                }
            }
            "capture" | "once" | "passive" | "native" => {}
            key => keys.push(key),
        }
    }

    if keys.is_empty() {
        return code;
    }
    let filters: Vec<String> = keys.iter().map(|key| key_filter(key)).collect();
    format!(
        "if(!$event.type.indexOf('key')&&{})return null;{}",
        filters.join("&&"),
        code
    )
}

fn key_filter(key: &str) -> String {
    if let Ok(code) = key.parse::<u32>() {
        return format!("$event.keyCode!=={}", code);
    }
    format!(
        "_k($event.keyCode,{},{},$event.key,{})",
        quote(key),
        key_code(key),
        key_name(key)
    )
}

fn key_code(key: &str) -> &'static str {
    match key {
        "esc" => "27",
        "tab" => "9",
        "enter" => "13",
        "space" => "32",
        "up" => "38",
        "left" => "37",
        "right" => "39",
        "down" => "40",
        "delete" => "[8,46]",
        _ => "undefined",
    }
}

fn key_name(key: &str) -> &'static str {
    match key {
        "esc" => r#"["Esc","Escape"]"#,
        "tab" => r#""Tab""#,
        "enter" => r#""Enter""#,
        "space" => r#"[" ","Spacebar"]"#,
        "up" => r#"["Up","ArrowUp"]"#,
        "left" => r#"["Left","ArrowLeft"]"#,
        "right" => r#"["Right","ArrowRight"]"#,
        "down" => r#"["Down","ArrowDown"]"#,
        "delete" => r#"["Backspace","Delete","Del"]"#,
        _ => "undefined",
    }
}

/// `&`, `~` and `!` markers for passive, once and capture listeners.
fn event_prefix(modifiers: &[SmolStr]) -> String {
    let mut prefix = String::new();
    if has(modifiers, "passive") {
        prefix.push('&');
    }
    if has(modifiers, "once") {
        prefix.push('~');
    }
    if has(modifiers, "capture") {
        prefix.push('!');
    }
    prefix
}

/// Attributes that must be set as DOM properties to take effect.
fn must_use_prop(tag: &str, input_type: Option<&str>, attr: &str) -> bool {
    (attr == "value"
        && matches!(tag, "input" | "textarea" | "option" | "select" | "progress")
        && input_type != Some("button"))
        || (attr == "selected" && tag == "option")
        || (attr == "checked" && tag == "input")
        || (attr == "muted" && tag == "video")
}

/// `color: red; margin: 0` as an object literal.
fn static_style(style: &str) -> String {
    let entries: Vec<String> = style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty()).then(|| format!("{}:{}", quote(name), quote(value)))
        })
        .collect();
    format!("{{{}}}", entries.join(","))
}

/// Convert to kebab-case.
fn hyphenate(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                result.push('-');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

fn is_fragment(node: &TemplateNode) -> bool {
    match node {
        TemplateNode::Element(el) => el.tag == "template",
        TemplateNode::SlotOutlet(_) | TemplateNode::Template(_) => true,
        _ => false,
    }
}

fn maybe_component(node: &TemplateNode) -> bool {
    match node {
        TemplateNode::Element(el) => el.is_component || el.tag == "component",
        TemplateNode::For(node) => node.children.iter().any(maybe_component),
        TemplateNode::If(node) => node
            .branches
            .iter()
            .any(|b| b.children.iter().any(maybe_component)),
        _ => false,
    }
}

/// 2 when children need full normalization (lists, fragments, slots),
/// 1 when they may contain components, 0 otherwise.
fn normalization_type(children: &[TemplateNode]) -> u8 {
    let mut result = 0;
    for child in children {
        let blocks: Vec<&TemplateNode> = match child {
            TemplateNode::If(node) => node.branches.iter().flat_map(|b| b.children.iter()).collect(),
            TemplateNode::Text(_) | TemplateNode::Comment(_) => continue,
            other => vec![other],
        };
        if blocks
            .iter()
            .any(|n| matches!(n, TemplateNode::For(_)) || is_fragment(n))
        {
            return 2;
        }
        if blocks.iter().any(|n| maybe_component(n)) {
            result = 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use crate::transforms::{transform, validate_root, TransformContext};
    use crate::WhitespaceMode;
    use pretty_assertions::assert_eq;

    /// The expression returned by the render function.
    fn render(source: &str) -> String {
        let generated = generate_for(source);
        assert!(generated.errors.is_empty(), "{:?}", generated.errors);
        let body = generated
            .code
            .strip_prefix(STATEFUL_PRELUDE)
            .and_then(|rest| rest.strip_suffix(EPILOGUE))
            .unwrap();
        body.to_string()
    }

    fn generate_for(source: &str) -> Generated {
        let (mut ast, errors) = parse_template(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let mut ctx = TransformContext::new(WhitespaceMode::Condense);
        transform(&mut ast, &mut ctx);
        let root = validate_root(&ast, &mut ctx);
        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
        generate(root, false)
    }

    #[test]
    fn test_text_and_interpolation() {
        assert_eq!(
            render("<div>Hi {{ name }}!</div>"),
            r#"_c('div',[_vm._v("Hi "+_vm._s(_vm.name)+"!")])"#
        );
    }

    #[test]
    fn test_static_and_bound_attributes() {
        assert_eq!(
            render(r#"<a class="x  y" :class="{ on: active }" href="/" :title="t"></a>"#),
            r#"_c('a',{staticClass:"x y",class:{ on: _vm.active },attrs:{"href":"/","title":_vm.t}})"#
        );
        assert_eq!(
            render(r#"<p style="color: red; margin: 0"></p>"#),
            r#"_c('p',{staticStyle:{"color":"red","margin":"0"}})"#
        );
    }

    #[test]
    fn test_events() {
        assert_eq!(
            render(r#"<button @click="onClick">x</button>"#),
            r#"_c('button',{on:{"click":_vm.onClick}},[_vm._v("x")])"#
        );
        assert_eq!(
            render(r#"<button @click="count++"></button>"#),
            r#"_c('button',{on:{"click":function($event){_vm.count++}}})"#
        );
        assert_eq!(
            render(r#"<button @click="select(item, $event)"></button>"#),
            r#"_c('button',{on:{"click":function($event){return _vm.select(_vm.item, $event)}}})"#
        );
        assert_eq!(
            render(r#"<form @submit.prevent="save"></form>"#),
            r#"_c('form',{on:{"submit":function($event){$event.preventDefault();return _vm.save.apply(null, arguments)}}})"#
        );
        assert_eq!(
            render(r#"<input @keyup.enter="go">"#),
            r#"_c('input',{on:{"keyup":function($event){if(!$event.type.indexOf('key')&&_vm._k($event.keyCode,"enter",13,$event.key,"Enter"))return null;return _vm.go.apply(null, arguments)}}})"#
        );
        assert_eq!(
            render(r#"<div @scroll.passive.once="f"></div>"#),
            r#"_c('div',{on:{"&~scroll":_vm.f}})"#
        );
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(
            render(r#"<div><p v-if="a">1</p><p v-else-if="b">2</p><p v-else>3</p></div>"#),
            r#"_c('div',[(_vm.a)?_c('p',[_vm._v("1")]):(_vm.b)?_c('p',[_vm._v("2")]):_c('p',[_vm._v("3")])])"#
        );
        assert_eq!(
            render(r#"<div><p v-if="a">1</p></div>"#),
            r#"_c('div',[(_vm.a)?_c('p',[_vm._v("1")]):_vm._e()])"#
        );
    }

    #[test]
    fn test_lists_scope_their_aliases() {
        assert_eq!(
            render(r#"<ul><li v-for="(item, i) in items" :key="item.id">{{ i }}: {{ item.name }} {{ total }}</li></ul>"#),
            r#"_c('ul',_vm._l((_vm.items),function(item, i){return _c('li',{key:item.id},[_vm._v(_vm._s(i)+": "+_vm._s(item.name)+" "+_vm._s(_vm.total))])}),0)"#
        );
        assert_eq!(
            render(r#"<div><span v-for="n in 3">{{ n }}</span><i></i></div>"#),
            r#"_c('div',[_vm._l((3),function(n){return _c('span',[_vm._v(_vm._s(n))])}),_c('i')],2)"#
        );
    }

    #[test]
    fn test_components_and_slots() {
        assert_eq!(
            render(r#"<div><MyButton :label="text" /></div>"#),
            r#"_c('div',[_c('MyButton',{attrs:{"label":_vm.text}})],1)"#
        );
        assert_eq!(
            render(r#"<List><template #row="{ item }">{{ item.name }}</template><template #footer>End</template></List>"#),
            r#"_c('List',{scopedSlots:_vm._u([{key:"row",fn:function({ item }){return [_vm._v(_vm._s(item.name))]}},{key:"footer",fn:function(){return [_vm._v("End")]},proxy:true}])})"#
        );
        assert_eq!(
            render(r#"<div><slot name="head" :item="x">Fallback</slot></div>"#),
            r#"_c('div',[_vm._t("head",function(){return [_vm._v("Fallback")]},{"item":_vm.x})],2)"#
        );
    }

    #[test]
    fn test_text_model() {
        assert_eq!(
            render(r#"<input v-model="query">"#),
            r#"_c('input',{directives:[{name:"model",rawName:"v-model",value:(_vm.query),expression:"query"}],domProps:{"value":(_vm.query)},on:{"input":function($event){if($event.target.composing)return;_vm.query=$event.target.value}}})"#
        );
    }

    #[test]
    fn test_member_model_uses_set() {
        let out = render(r#"<input v-model.trim="form.name">"#);
        assert!(out.contains(r#"_vm.$set(_vm.form, "name", $event.target.value.trim())"#), "{}", out);
        assert!(out.contains(r#""blur":function($event){return _vm.$forceUpdate()}"#), "{}", out);
    }

    #[test]
    fn test_component_model() {
        assert_eq!(
            render(r#"<MyInput v-model="value" />"#),
            r#"_c('MyInput',{model:{value:(_vm.value),callback:function ($$v) {_vm.value=$$v},expression:"value"}})"#
        );
    }

    #[test]
    fn test_sync_modifier_adds_update_listener() {
        let out = render(r#"<Dialog :visible.sync="open" />"#);
        assert!(out.contains(r#"attrs:{"visible":_vm.open}"#), "{}", out);
        assert!(out.contains(r#"on:{"update:visible":function($event){_vm.open=$event}}"#), "{}", out);
    }

    #[test]
    fn test_runtime_directives() {
        assert_eq!(
            render(r#"<div v-show="visible" v-focus:x.lazy="f"></div>"#),
            r#"_c('div',{directives:[{name:"show",rawName:"v-show",value:(_vm.visible),expression:"visible"},{name:"focus",rawName:"v-focus:x.lazy",value:(_vm.f),expression:"f",arg:"x",modifiers:{"lazy":true}}]})"#
        );
        assert_eq!(
            render(r#"<div v-html="raw"></div>"#),
            r#"_c('div',{domProps:{"innerHTML":(_vm.raw)}})"#
        );
    }

    #[test]
    fn test_ref_in_for() {
        let out = render(r#"<ul><li v-for="x in xs" ref="rows"></li></ul>"#);
        assert!(out.contains(r#"{ref:"rows",refInFor:true}"#), "{}", out);
    }

    #[test]
    fn test_object_bindings() {
        assert_eq!(
            render(r#"<div v-bind="attrs" v-on="listeners"></div>"#),
            r#"_c('div',_vm._g(_vm._b({},'div',_vm.attrs),_vm.listeners))"#
        );
    }

    #[test]
    fn test_invalid_expression_is_reported() {
        let generated = generate_for("<div>{{ a + }}</div>");
        assert_eq!(generated.errors.len(), 1);
        assert!(generated.errors[0].message.starts_with("invalid expression:"));
        assert_eq!(generated.errors[0].span, Span::new(8, 11));
    }

    #[test]
    fn test_expression_mappings_point_at_template() {
        let source = "<div>{{ count }}</div>";
        let generated = generate_for(source);
        let at = generated.code.find("_vm.count").unwrap() as u32 + 4;
        assert_eq!(generated.map.to_source_offset(at), Some(8));
    }

    #[test]
    fn test_functional_prelude_and_stub() {
        let generated = generate(None, true);
        assert!(generated.code.starts_with(FUNCTIONAL_PRELUDE));
        assert!(generated.code.ends_with("var staticRenderFns = []\n"));
        assert!(stub(false).contains("return _vm._e()}"));
    }

    #[test]
    fn test_split_model() {
        assert!(split_model("value").is_none());
        let (object, key) = split_model("a.b.c").unwrap();
        assert_eq!(object, 0..3);
        assert!(matches!(key, ModelKey::Name(r) if r == (4..5)));
        let (object, key) = split_model("list[i]").unwrap();
        assert_eq!(object, 0..4);
        assert!(matches!(key, ModelKey::Computed(r) if r == (5..6)));
    }
}
