//! The pretty printer core.
//!
//! Rendering a term proceeds in two phases. Purification rewrites the input
//! so every metavariable and local constant carries a printable,
//! collision-free name. Printing then descends through `pp_child`, which
//! consults the notation table at every node before falling back to the
//! structural case printers, and parenthesizes exactly when a child's
//! binding power is too low for its context.
use crate::doc::{colon, comma, highlight, highlight_keyword, line, paren, space, DocPtr};
use crate::env::{Action, NotationEntry};
use crate::expr::{BinderStyle, Expr::*};
use crate::level::{is_placeholder_level, mk_meta_level, Level};
use crate::name::{internal_name, str1};
use crate::util::{
    new_fx_hash_map, new_fx_hash_set, ExprPtr, FxHashMap, FxHashSet, IsCtx, LevelPtr, LevelsPtr, NamePtr, StringPtr,
    TermCtx,
};
use num_bigint::BigUint;
use serde::Deserialize;

/// The binding power of an atom; nothing printed at this power is ever
/// parenthesized.
pub const MAX_BP: u32 = 1024;
/// The precedence of the function type arrow.
pub const ARROW_PREC: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PpOptions {
    /// Show implicit arguments, and prefix heads that have implicit
    /// parameters with `@`.
    pub implicit: bool,
    /// Select unicode tokens (`λ`, `Π`, `∀`, `→`, `⦃⦄`, `…`) over their
    /// ASCII spellings.
    pub unicode: bool,
    /// When off, registered coercion heads are elided.
    pub coercions: bool,
    /// When off, the notation layer is skipped entirely.
    pub notation: bool,
    /// Display universe arguments and `Type.{..}`.
    pub universes: bool,
    /// When off, constants are shortened through aliases and active
    /// namespaces.
    pub full_names: bool,
    /// When off, hidden names are mapped to their user-facing aliases.
    pub private_names: bool,
    /// When off, the argument spine of a metavariable is hidden.
    pub metavar_args: bool,
    /// Beta-reduce before printing.
    pub beta: bool,
    /// Indentation width for nested groups.
    pub indent: usize,
    /// Exceeding this depth collapses the subtree to an ellipsis.
    pub max_depth: usize,
    /// Exceeding this step count collapses the remaining emission to an
    /// ellipsis.
    pub max_steps: usize,
    /// Line width for rendering.
    pub width: usize,
}

impl Default for PpOptions {
    fn default() -> Self {
        PpOptions {
            implicit: false,
            unicode: true,
            coercions: true,
            notation: true,
            universes: false,
            full_names: false,
            private_names: false,
            metavar_args: false,
            beta: false,
            indent: 2usize,
            max_depth: 64usize,
            max_steps: 5000usize,
            width: 100usize,
        }
    }
}

impl PpOptions {
    /// The "show me everything" option set.
    pub fn all() -> Self {
        PpOptions {
            implicit: true,
            universes: true,
            full_names: true,
            private_names: true,
            metavar_args: true,
            notation: false,
            coercions: false,
            ..PpOptions::default()
        }
    }
}

/// A formatted subterm together with the binding powers gating whether a
/// surrounding context must parenthesize it. `lbp` gates attachment on the
/// left, `rbp` on the right.
#[derive(Clone)]
pub struct PpResult {
    lbp: u32,
    rbp: u32,
    doc: DocPtr,
}

impl PpResult {
    fn of_doc(doc: impl Into<DocPtr>) -> Self { Self { lbp: MAX_BP, rbp: MAX_BP, doc: doc.into() } }

    fn with_rbp(rbp: u32, doc: impl Into<DocPtr>) -> Self { Self { lbp: MAX_BP, rbp, doc: doc.into() } }

    fn new(lbp: u32, rbp: u32, doc: impl Into<DocPtr>) -> Self { Self { lbp, rbp, doc: doc.into() } }

    pub fn lbp(&self) -> u32 { self.lbp }

    pub fn rbp(&self) -> u32 { self.rbp }

    pub fn doc(&self) -> DocPtr { self.doc.clone() }
}

/// The keyword and glyph documents, styled once at construction.
struct Tokens {
    ellipsis_n: DocPtr,
    ellipsis: DocPtr,
    placeholder: DocPtr,
    lambda_n: DocPtr,
    lambda: DocPtr,
    forall_n: DocPtr,
    forall_: DocPtr,
    pi_n: DocPtr,
    pi: DocPtr,
    arrow_n: DocPtr,
    arrow: DocPtr,
    let_: DocPtr,
    in_: DocPtr,
    assign: DocPtr,
    have_: DocPtr,
    from_: DocPtr,
    visible: DocPtr,
    show_: DocPtr,
    explicit_: DocPtr,
}

impl Tokens {
    fn new() -> Self {
        Tokens {
            ellipsis_n: highlight("\u{2026}"),
            ellipsis: highlight("..."),
            placeholder: highlight("_"),
            lambda_n: highlight_keyword("\u{03BB}"),
            lambda: highlight_keyword("fun"),
            forall_n: highlight_keyword("\u{2200}"),
            forall_: highlight_keyword("forall"),
            pi_n: highlight_keyword("Π"),
            pi: highlight_keyword("Pi"),
            arrow_n: highlight_keyword("\u{2192}"),
            arrow: highlight_keyword("->"),
            let_: highlight_keyword("let"),
            in_: highlight_keyword("in"),
            assign: highlight_keyword(":="),
            have_: highlight_keyword("have"),
            from_: highlight_keyword("from"),
            visible: highlight_keyword("[visible]"),
            show_: highlight_keyword("show"),
            explicit_: highlight_keyword("@"),
        }
    }
}

pub struct PrettyPrinter<'x, 't, 'p> {
    pub(crate) ctx: &'x mut TermCtx<'t, 'p>,
    options: PpOptions,
    tokens: Tokens,
    depth: usize,
    num_steps: usize,
    meta_prefix: NamePtr<'t>,
    next_meta_idx: u64,
    purify_meta_table: FxHashMap<NamePtr<'t>, NamePtr<'t>>,
    purify_local_table: FxHashMap<NamePtr<'t>, NamePtr<'t>>,
    purify_used_locals: FxHashSet<NamePtr<'t>>,
}

impl<'x, 't, 'p: 't> PrettyPrinter<'x, 't, 'p> {
    pub fn new(ctx: &'x mut TermCtx<'t, 'p>, options: PpOptions) -> Self {
        let meta_prefix = str1("M", ctx);
        Self {
            ctx,
            options,
            tokens: Tokens::new(),
            depth: 0,
            num_steps: 0,
            meta_prefix,
            next_meta_idx: 1,
            purify_meta_table: new_fx_hash_map(),
            purify_local_table: new_fx_hash_map(),
            purify_used_locals: new_fx_hash_set(),
        }
    }

    pub fn options(&self) -> &PpOptions { &self.options }

    /// Reconfigure; a no-op when the new option set equals the current one.
    pub fn set_options(&mut self, options: PpOptions) {
        if options == self.options {
            return
        }
        self.options = options;
    }

    // ------------------------------------------------------------------
    // Purification
    // ------------------------------------------------------------------

    fn mk_metavar_name(&mut self, m: NamePtr<'t>) -> NamePtr<'t> {
        if let Some(cached) = self.purify_meta_table.get(&m) {
            return *cached
        }
        let new_m = self.meta_prefix.append_index_after(self.next_meta_idx, self.ctx);
        self.next_meta_idx += 1;
        self.purify_meta_table.insert(m, new_m);
        new_m
    }

    fn mk_local_name(&mut self, n: NamePtr<'t>, suggested: NamePtr<'t>) -> NamePtr<'t> {
        if let Some(cached) = self.purify_local_table.get(&n) {
            return *cached
        }
        let suggested = if suggested.is_anon(self.ctx) { str1("a", self.ctx) } else { suggested };
        let mut i = 1u64;
        let mut r = suggested;
        while self.purify_used_locals.contains(&r) {
            r = suggested.append_index_after(i, self.ctx);
            i += 1;
        }
        self.purify_used_locals.insert(r);
        self.purify_local_table.insert(n, r);
        r
    }

    fn purify_level(&mut self, l: LevelPtr<'t>) -> LevelPtr<'t> {
        if !self.options.universes || !l.has_meta(self.ctx) {
            return l
        }
        match self.ctx.read_level(l) {
            Level::Zero | Level::Param(..) => l,
            Level::Meta(m, ..) => {
                let renamed = self.mk_metavar_name(m);
                mk_meta_level(renamed, self.ctx)
            }
            Level::Succ(pred, ..) => {
                let pred = self.purify_level(pred);
                pred.new_succ(self.ctx)
            }
            Level::Max(a, b, ..) => {
                let a = self.purify_level(a);
                let b = self.purify_level(b);
                a.new_max(b, self.ctx)
            }
            Level::IMax(a, b, ..) => {
                let a = self.purify_level(a);
                let b = self.purify_level(b);
                a.new_imax(b, self.ctx)
            }
        }
    }

    /// Make sure that all metavariables have reasonable names, and that no
    /// two distinct local constants share a user-visible name.
    ///
    /// The printer also creates new local constants while printing binders,
    /// and those draw from the same used-name set, so they cannot collide
    /// with anything renamed here.
    fn purify(&mut self, e: ExprPtr<'t>) -> ExprPtr<'t> {
        if !e.has_emvars(self.ctx)
            && !e.has_fvars(self.ctx)
            && (!self.options.universes || !e.has_umvars(self.ctx))
        {
            return e
        }
        match self.ctx.read_expr(e) {
            Var { .. } => e,
            Meta { name, ty, .. } => {
                let renamed = self.mk_metavar_name(name);
                <ExprPtr>::new_meta(renamed, ty, self.ctx)
            }
            Local { name, pp_name, binder_style, binder_type, .. } => {
                let renamed = self.mk_local_name(name, pp_name);
                <ExprPtr>::new_local(name, renamed, binder_style, binder_type, self.ctx)
            }
            Const { name, levels, .. } => {
                let levels =
                    self.ctx.read_levels(levels).iter().map(|l| self.purify_level(*l)).collect::<Vec<_>>();
                let levels = self.ctx.alloc_levels_slice(levels.as_slice());
                <ExprPtr>::new_const(name, levels, self.ctx)
            }
            Sort { level, .. } => {
                let level = self.purify_level(level);
                <ExprPtr>::new_sort(level, self.ctx)
            }
            App { fun, arg, .. } => {
                let fun = self.purify(fun);
                let arg = self.purify(arg);
                fun.new_app(arg, self.ctx)
            }
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = self.purify(binder_type);
                let body = self.purify(body);
                <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, self.ctx)
            }
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = self.purify(binder_type);
                let body = self.purify(body);
                <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, self.ctx)
            }
            Macro { m_name, args, .. } => {
                let args = self.ctx.read_exprs(args).iter().map(|a| self.purify(*a)).collect::<Vec<_>>();
                <ExprPtr>::new_macro(m_name, args.as_slice(), self.ctx)
            }
        }
    }

    // ------------------------------------------------------------------
    // Type-checker queries; every failure degrades to "no info"
    // ------------------------------------------------------------------

    /// Whether the next argument of `f` is inserted implicitly. Always false
    /// while implicit display is on, since nothing is being hidden.
    fn is_implicit(&mut self, f: ExprPtr<'t>) -> bool {
        if self.options.implicit {
            return false
        }
        if !f.closed(self.ctx) {
            // the type checker assumes expressions are closed
            return false
        }
        self.ctx.with_tc(|tc| {
            let style = tc.infer(f).and_then(|t| tc.ensure_pi(t)).map(|pi| match tc.ctx.read_expr(pi) {
                Pi { binder_style, .. } => binder_style,
                _ => BinderStyle::Default,
            });
            style.map(|s| s.is_implicit()).unwrap_or(false)
        })
    }

    fn is_prop(&mut self, e: ExprPtr<'t>) -> bool {
        self.ctx.with_tc(|tc| tc.is_prop(e).unwrap_or(false))
    }

    /// Whether any position of `f`'s telescope is implicit.
    fn has_implicit_args(&mut self, f: ExprPtr<'t>) -> bool {
        if !f.closed(self.ctx) {
            return false
        }
        self.ctx.with_tc(|tc| {
            let mut ty = match tc.infer(f).and_then(|t| tc.whnf(t)) {
                Ok(t) => t,
                Err(_) => return false,
            };
            while ty.is_pi(tc.ctx) {
                match tc.telescope_step(ty) {
                    Ok((style, next)) => {
                        if style.is_implicit() {
                            return true
                        }
                        ty = next;
                    }
                    Err(_) => return false,
                }
            }
            false
        })
    }

    // ------------------------------------------------------------------
    // Child printing and parenthesization
    // ------------------------------------------------------------------

    fn pp_child_core(&mut self, e: ExprPtr<'t>, bp: u32) -> PpResult {
        let r = self.pp(e);
        if r.rbp < bp {
            PpResult::of_doc(paren(r.doc()))
        } else {
            r
        }
    }

    fn head_is_elided_coercion(&mut self, e: ExprPtr<'t>) -> bool {
        if self.options.coercions {
            return false
        }
        let head = e.unfold_apps_fun(self.ctx);
        match head.try_const_info(self.ctx) {
            Some((name, _)) => self.ctx.env.is_coercion(name).is_some(),
            None => false,
        }
    }

    /// Print `e` so it is safely embeddable in a context demanding
    /// right-binding-power at least `bp`.
    pub fn pp_child(&mut self, e: ExprPtr<'t>, bp: u32) -> PpResult {
        if let Some((fun, _)) = e.try_app(self.ctx) {
            if self.is_implicit(fun) {
                return self.pp_child(fun, bp)
            }
            if self.head_is_elided_coercion(e) {
                return self.pp_coercion(e, bp)
            }
        }
        self.pp_child_core(e, bp)
    }

    /// Like `pp_child`, but with both precedence gates of a notation frame:
    /// parenthesize when the child's right power falls below the left
    /// context, or its left power reaches down to the right context.
    fn pp_notation_child(&mut self, e: ExprPtr<'t>, lbp: u32, rbp: u32) -> PpResult {
        if let Some((fun, _)) = e.try_app(self.ctx) {
            if self.is_implicit(fun) {
                return self.pp_notation_child(fun, lbp, rbp)
            }
            if self.head_is_elided_coercion(e) {
                return self.pp_coercion(e, rbp)
            }
        }
        let r = self.pp(e);
        if r.rbp < lbp || r.lbp <= rbp {
            PpResult::of_doc(paren(r.doc()))
        } else {
            r
        }
    }

    // ------------------------------------------------------------------
    // Coercion elision
    // ------------------------------------------------------------------

    fn pp_coercion_fn(&mut self, e: ExprPtr<'t>, sz: usize) -> PpResult {
        match e.try_app(self.ctx) {
            Some((fun, arg)) => {
                if sz == 1 {
                    return self.pp_child(arg, MAX_BP - 1)
                }
                if self.is_implicit(fun) {
                    return self.pp_coercion_fn(fun, sz - 1)
                }
                let res_fn = self.pp_coercion_fn(fun, sz - 1);
                let mut fn_fmt = res_fn.doc();
                if self.options.implicit && sz == 2 && self.has_implicit_args(fun) {
                    fn_fmt = self.tokens.explicit_.concat(fn_fmt);
                }
                let res_arg = self.pp_child(arg, MAX_BP);
                let fmt = fn_fmt.concat(line().concat(res_arg.doc()).mk_nest(self.options.indent)).group();
                PpResult::with_rbp(MAX_BP - 1, fmt)
            }
            None => self.pp(e),
        }
    }

    /// Render an application whose head is a registered coercion, with the
    /// coercion head and its preamble arguments stripped.
    fn pp_coercion(&mut self, e: ExprPtr<'t>, bp: u32) -> PpResult {
        let (f, args) = e.unfold_apps(self.ctx);
        let arity = f.try_const_info(self.ctx).and_then(|(n, _)| self.ctx.env.is_coercion(n));
        let k = match arity {
            Some(k) => k as usize,
            None => return self.pp_child_core(e, bp),
        };
        if k >= args.len() {
            self.pp_child_core(e, bp)
        } else if k == args.len() - 1 {
            self.pp_child(args[args.len() - 1], bp)
        } else {
            let sz = args.len() - k;
            debug_assert!(sz >= 2);
            let r = self.pp_coercion_fn(e, sz);
            if r.rbp < bp {
                PpResult::of_doc(paren(r.doc()))
            } else {
                r
            }
        }
    }

    // ------------------------------------------------------------------
    // Structural case printers
    // ------------------------------------------------------------------

    fn pp_var(&mut self, dbj_idx: u16) -> PpResult {
        PpResult::of_doc(DocPtr::from("#").concat(dbj_idx.to_string()))
    }

    fn pp_sort(&mut self, level: LevelPtr<'t>) -> PpResult {
        if self.ctx.env.impredicative() && level == self.ctx.zero() {
            PpResult::of_doc("Prop")
        } else if self.options.universes {
            let l_fmt = self.pp_level(level);
            PpResult::of_doc(DocPtr::from("Type.{").concat(l_fmt.mk_nest(6)).concat("}").group())
        } else {
            PpResult::of_doc("Type")
        }
    }

    /// The registered alias for `n`, unless it is shadowed by a declaration
    /// reachable through an active namespace.
    fn is_aliased(&mut self, n: NamePtr<'t>) -> Option<NamePtr<'t>> {
        let alias = self.ctx.env.alias_of(n)?;
        let namespaces = self.ctx.env.namespaces().to_vec();
        for ns in namespaces {
            if ns.is_anon(self.ctx) {
                continue
            }
            let shadowing = ns.concat(alias, self.ctx);
            if self.ctx.env.contains(shadowing) {
                return None
            }
        }
        Some(alias)
    }

    fn pp_const(&mut self, name: NamePtr<'t>, levels: LevelsPtr<'t>) -> PpResult {
        let mut n = name;
        if !self.options.full_names {
            if let Some(alias) = self.is_aliased(n) {
                n = alias;
            } else {
                // strip the longest active-namespace prefix leaving a
                // non-empty residual
                let namespaces = self.ctx.env.namespaces().to_vec();
                let anon = self.ctx.anonymous();
                let mut best: Option<(usize, NamePtr<'t>)> = None;
                for ns in namespaces {
                    if ns.is_anon(self.ctx) {
                        continue
                    }
                    let stripped = n.replace_pfx(ns, anon, self.ctx);
                    if stripped != n && !stripped.is_anon(self.ctx) {
                        let sz = ns.segments(self.ctx);
                        if best.map(|(b, _)| sz > b).unwrap_or(true) {
                            best = Some((sz, stripped));
                        }
                    }
                }
                if let Some((_, stripped)) = best {
                    n = stripped;
                }
            }
        }
        if !self.options.private_names {
            if let Some(user) = self.ctx.env.hidden_to_user(n) {
                n = user;
            }
        }
        let levels = self.ctx.read_levels(levels);
        if self.options.universes && !levels.is_empty() {
            let mut r = DocPtr::from(n.to_display_string(self.ctx)).concat(".{");
            let mut first = true;
            for l in levels.iter().copied() {
                let mut l_fmt = self.pp_level(l);
                if l.is_any_max(self.ctx) {
                    l_fmt = paren(l_fmt);
                }
                if first {
                    r = r.concat(l_fmt.mk_nest(self.options.indent));
                } else {
                    r = r.concat(line().concat(l_fmt).mk_nest(self.options.indent));
                }
                first = false;
            }
            PpResult::of_doc(r.concat("}").group())
        } else {
            PpResult::of_doc(n.to_display_string(self.ctx))
        }
    }

    fn pp_meta(&mut self, e: ExprPtr<'t>) -> PpResult {
        match self.ctx.read_expr(e) {
            Meta { name, .. } => PpResult::of_doc(DocPtr::from("?").concat(name.to_display_string(self.ctx))),
            owise => unreachable!("pp_meta requires a metavariable, got {:?}", owise),
        }
    }

    fn pp_local(&mut self, e: ExprPtr<'t>) -> PpResult {
        match self.ctx.read_expr(e) {
            Local { pp_name, .. } => PpResult::of_doc(pp_name.to_display_string(self.ctx)),
            owise => unreachable!("pp_local requires a local constant, got {:?}", owise),
        }
    }

    fn pp_app(&mut self, e: ExprPtr<'t>) -> PpResult {
        let (fun, arg) = match e.try_app(self.ctx) {
            Some(parts) => parts,
            None => unreachable!("pp_app requires an application"),
        };
        let res_fn = self.pp_child(fun, MAX_BP - 1);
        let mut fn_fmt = res_fn.doc();
        if self.options.implicit && !fun.is_app(self.ctx) && self.has_implicit_args(fun) {
            fn_fmt = self.tokens.explicit_.concat(fn_fmt);
        }
        let res_arg = self.pp_child(arg, MAX_BP);
        let fmt = fn_fmt.concat(line().concat(res_arg.doc()).mk_nest(self.options.indent)).group();
        PpResult::with_rbp(MAX_BP - 1, fmt)
    }

    // ------------------------------------------------------------------
    // Binder blocks
    // ------------------------------------------------------------------

    fn local_parts(&self, l: ExprPtr<'t>) -> (NamePtr<'t>, ExprPtr<'t>, BinderStyle) {
        match self.ctx.read_expr(l) {
            Local { pp_name, binder_type, binder_style, .. } => (pp_name, binder_type, binder_style),
            owise => unreachable!("expected a local constant, got {:?}", owise),
        }
    }

    /// Open one binder: build a local constant with a fresh, collision-free
    /// user name and substitute it into the body.
    fn binding_body_fresh(&mut self, b: ExprPtr<'t>) -> (ExprPtr<'t>, ExprPtr<'t>) {
        match self.ctx.read_expr(b) {
            Lambda { binder_name, binder_style, binder_type, body, .. }
            | Pi { binder_name, binder_style, binder_type, body, .. } => {
                let internal = internal_name(self.ctx);
                let fresh = self.mk_local_name(internal, binder_name);
                let local = <ExprPtr>::new_local(internal, fresh, binder_style, binder_type, self.ctx);
                (body.inst1(local, self.ctx), local)
            }
            owise => unreachable!("binding_body_fresh requires a binder, got {:?}", owise),
        }
    }

    fn pp_binder_block(&mut self, names: &[NamePtr<'t>], type_: ExprPtr<'t>, bi: BinderStyle) -> DocPtr {
        let (open, close) = match bi {
            BinderStyle::Implicit => ("{", "}"),
            BinderStyle::InstImplicit => ("[", "]"),
            BinderStyle::StrictImplicit if self.options.unicode => ("\u{2983}", "\u{2984}"),
            BinderStyle::StrictImplicit => ("{{", "}}"),
            BinderStyle::Default | BinderStyle::Contextual => ("(", ")"),
        };
        let mut r = DocPtr::from(open);
        for n in names.iter() {
            r = r.concat(n.to_display_string(self.ctx)).concat(space());
        }
        let ty = self.pp_child(type_, 0).doc();
        r = r.concat(colon().concat(line().concat(ty).mk_nest(self.options.indent)));
        r.concat(close).group()
    }

    /// Collapse a run of opened binders into blocks, grouping consecutive
    /// binders that share both domain type and binder style.
    fn pp_binders(&mut self, locals: &[ExprPtr<'t>]) -> DocPtr {
        let (first_name, mut type_, mut bi) = self.local_parts(locals[0]);
        let mut names = vec![first_name];
        let mut r = DocPtr::from("");
        for local in locals[1..].iter().copied() {
            let (n, lty, lbi) = self.local_parts(local);
            if lty == type_ && lbi == bi {
                names.push(n);
            } else {
                let block = self.pp_binder_block(names.as_slice(), type_, bi);
                r = r.concat(line().concat(block).group());
                names.clear();
                type_ = lty;
                bi = lbi;
                names.push(n);
            }
        }
        let block = self.pp_binder_block(names.as_slice(), type_, bi);
        r.concat(line().concat(block).group())
    }

    fn pp_lambda(&mut self, e: ExprPtr<'t>) -> PpResult {
        let mut b = e;
        let mut locals = Vec::new();
        while b.is_lambda(self.ctx) {
            let (body, local) = self.binding_body_fresh(b);
            locals.push(local);
            b = body;
        }
        let head = if self.options.unicode { self.tokens.lambda_n.clone() } else { self.tokens.lambda.clone() };
        let binders = self.pp_binders(locals.as_slice());
        let body = self.pp_child(b, 0).doc();
        let r = head.concat(binders).concat(comma().concat(line().concat(body).mk_nest(self.options.indent)));
        PpResult::with_rbp(0, r)
    }

    /// A pi prints as an arrow iff its binder info is the default one and the
    /// binder is vacuous; anything else would lose binder information.
    fn is_default_arrow(&self, e: ExprPtr<'t>) -> bool {
        match self.ctx.read_expr(e) {
            Pi { binder_style: BinderStyle::Default, body, .. } => !body.has_loose_bvar(0, self.ctx),
            _ => false,
        }
    }

    fn pp_pi(&mut self, e: ExprPtr<'t>) -> PpResult {
        if self.is_default_arrow(e) {
            let (binder_type, body) = match self.ctx.read_expr(e) {
                Pi { binder_type, body, .. } => (binder_type, body),
                owise => unreachable!("pp_pi requires a pi, got {:?}", owise),
            };
            let lhs = self.pp_child(binder_type, ARROW_PREC);
            let lowered = body.lower_loose_bvars1(self.ctx);
            let rhs = self.pp_child(lowered, ARROW_PREC - 1);
            let arrow = if self.options.unicode { self.tokens.arrow_n.clone() } else { self.tokens.arrow.clone() };
            let r = lhs.doc().concat_w_space(arrow).concat(line()).concat(rhs.doc()).group();
            PpResult::with_rbp(ARROW_PREC - 1, r)
        } else {
            let mut b = e;
            let mut locals = Vec::new();
            while b.is_pi(self.ctx) && !self.is_default_arrow(b) {
                let (body, local) = self.binding_body_fresh(b);
                locals.push(local);
                b = body;
            }
            let head = if self.is_prop(b) {
                if self.options.unicode {
                    self.tokens.forall_n.clone()
                } else {
                    self.tokens.forall_.clone()
                }
            } else if self.options.unicode {
                self.tokens.pi_n.clone()
            } else {
                self.tokens.pi.clone()
            };
            let binders = self.pp_binders(locals.as_slice());
            let body = self.pp_child(b, 0).doc();
            let r = head.concat(binders).concat(comma().concat(line().concat(body).mk_nest(self.options.indent)));
            PpResult::with_rbp(0, r)
        }
    }

    // ------------------------------------------------------------------
    // Surface forms: have / show / explicit / let / macros / numerals
    // ------------------------------------------------------------------

    fn pp_have(&mut self, e: ExprPtr<'t>) -> PpResult {
        let (fun, proof) = match e.try_app(self.ctx) {
            Some(parts) => parts,
            None => unreachable!("pp_have requires an application"),
        };
        let binding = match fun.annotation_arg(self.ctx) {
            Some(b) => b,
            None => unreachable!("pp_have requires a have annotation"),
        };
        let contextual = matches!(
            self.ctx.read_expr(binding),
            Lambda { binder_style: BinderStyle::Contextual, .. }
        );
        let (body, local) = self.binding_body_fresh(binding);
        let (n, lty, _) = self.local_parts(local);
        let type_fmt = self.pp_child(lty, 0).doc();
        let proof_fmt = self.pp_child(proof, 0).doc();
        let body_fmt = self.pp_child(body, 0).doc();
        let mut r = self.tokens.have_.concat(space()).concat(n.to_display_string(self.ctx)).concat(space());
        if contextual {
            r = r.concat(self.tokens.visible.clone()).concat(space());
        }
        let r = r
            .concat(colon())
            .concat(
                line()
                    .concat(type_fmt)
                    .concat(comma())
                    .concat(space())
                    .concat(self.tokens.from_.clone())
                    .mk_nest(self.options.indent),
            )
            .group();
        let r = r.concat(line().concat(proof_fmt).concat(comma()).mk_nest(self.options.indent)).group();
        PpResult::with_rbp(0, r.concat(line()).concat(body_fmt))
    }

    fn pp_show(&mut self, e: ExprPtr<'t>) -> PpResult {
        let s = match e.annotation_arg(self.ctx) {
            Some(s) => s,
            None => unreachable!("pp_show requires a show annotation"),
        };
        let (fun, proof) = match s.try_app(self.ctx) {
            Some(parts) => parts,
            None => unreachable!("pp_show requires an applied lambda"),
        };
        let type_ = match self.ctx.read_expr(fun) {
            Lambda { binder_type, .. } => binder_type,
            owise => unreachable!("pp_show requires a lambda, got {:?}", owise),
        };
        let type_fmt = self.pp_child(type_, 0).doc();
        let proof_fmt = self.pp_child(proof, 0).doc();
        let r = self
            .tokens
            .show_
            .concat(space())
            .concat(type_fmt.mk_nest(5))
            .concat(comma())
            .concat(space())
            .concat(self.tokens.from_.clone())
            .group();
        let r = r.concat(line().concat(proof_fmt).mk_nest(self.options.indent));
        PpResult::with_rbp(0, r.group())
    }

    fn pp_explicit(&mut self, e: ExprPtr<'t>) -> PpResult {
        let arg = match e.annotation_arg(self.ctx) {
            Some(arg) => arg,
            None => unreachable!("pp_explicit requires an explicit annotation"),
        };
        let res_arg = self.pp_child(arg, MAX_BP);
        PpResult::with_rbp(MAX_BP, self.tokens.explicit_.concat(res_arg.doc()))
    }

    fn pp_macro(&mut self, e: ExprPtr<'t>) -> PpResult {
        if e.is_explicit(self.ctx) {
            return self.pp_explicit(e)
        }
        let (m_name, args) = match self.ctx.read_expr(e) {
            Macro { m_name, args, .. } => (m_name, self.ctx.read_exprs(args)),
            owise => unreachable!("pp_macro requires a macro, got {:?}", owise),
        };
        let mut r = DocPtr::from("[").concat(m_name.to_display_string(self.ctx));
        for arg in args.iter().copied() {
            let a_fmt = self.pp_child(arg, MAX_BP).doc();
            r = r.concat(line().concat(a_fmt).mk_nest(self.options.indent));
        }
        PpResult::of_doc(r.concat("]").group())
    }

    fn pick_unused_name(&mut self, b: ExprPtr<'t>, suggested: NamePtr<'t>) -> NamePtr<'t> {
        let suggested = if suggested.is_anon(self.ctx) { str1("a", self.ctx) } else { suggested };
        let mut r = suggested;
        let mut i = 1u64;
        while b.contains_const(r, self.ctx) {
            r = suggested.append_index_after(i, self.ctx);
            i += 1;
        }
        r
    }

    /// Collect a chain of let bindings, dropping any binding whose value the
    /// body no longer mentions.
    fn pp_let(&mut self, e: ExprPtr<'t>) -> PpResult {
        let mut e = e;
        let mut decls: Vec<(NamePtr<'t>, ExprPtr<'t>)> = Vec::new();
        while e.is_let(self.ctx) {
            let (n, v, b) = match e.let_parts(self.ctx) {
                Some(parts) => parts,
                None => break,
            };
            debug_assert!(b.closed(self.ctx));
            let b1 = b.abstr_expr(v, self.ctx);
            if b1.closed(self.ctx) {
                e = b1;
            } else {
                let n = self.pick_unused_name(b1, n);
                decls.push((n, v));
                let levels = self.ctx.alloc_levels_slice(&[]);
                let stand_in = <ExprPtr>::new_const(n, levels, self.ctx);
                e = b1.inst1(stand_in, self.ctx);
            }
        }
        if decls.is_empty() {
            return self.pp(e)
        }
        let mut r = self.tokens.let_.clone();
        let sz = decls.len();
        for (i, (n, v)) in decls.iter().copied().enumerate() {
            let beg = if i == 0 { space() } else { line() };
            let v_fmt = self.pp_child(v, 0).doc();
            let mut val_tail = line().concat(v_fmt);
            if i < sz - 1 {
                val_tail = val_tail.concat(comma());
            }
            let entry = DocPtr::from(n.to_display_string(self.ctx))
                .concat(space())
                .concat(self.tokens.assign.clone())
                .concat(val_tail.mk_nest(self.options.indent));
            r = r.concat(beg.concat(entry.group()).mk_nest(3 + 1));
        }
        let b_fmt = self.pp_child(e, 0).doc();
        let r = r.concat(line()).concat(self.tokens.in_.clone()).concat(space()).concat(b_fmt.mk_nest(2 + 1));
        PpResult::with_rbp(0, r)
    }

    fn pp_num(&mut self, n: BigUint) -> PpResult { PpResult::of_doc(n.to_string()) }

    // ------------------------------------------------------------------
    // Levels
    // ------------------------------------------------------------------

    fn pp_level(&mut self, l: LevelPtr<'t>) -> DocPtr {
        match self.ctx.read_level(l) {
            Level::Param(p, ..) => p.to_display_string(self.ctx).into(),
            Level::Meta(m, ..) => DocPtr::from("?").concat(m.to_display_string(self.ctx)),
            Level::Max(a, b, ..) => {
                let a_fmt = self.pp_level_child(a);
                let b_fmt = self.pp_level_child(b);
                DocPtr::from("max").concat_w_space(a_fmt).concat_line(b_fmt)
            }
            Level::IMax(a, b, ..) => {
                let a_fmt = self.pp_level_child(a);
                let b_fmt = self.pp_level_child(b);
                DocPtr::from("imax").concat_w_space(a_fmt).concat_line(b_fmt)
            }
            _ => {
                let (inner, n) = l.succ_offset(self.ctx);
                match self.ctx.read_level(inner) {
                    Level::Zero => DocPtr::from(n.to_string()),
                    _ => self.pp_level_child(inner).concat("+").concat(n.to_string()),
                }
            }
        }
    }

    fn pp_level_child(&mut self, l: LevelPtr<'t>) -> DocPtr {
        let composite = match self.ctx.read_level(l) {
            Level::Max(..) | Level::IMax(..) => true,
            Level::Succ(..) => {
                let (inner, _) = l.succ_offset(self.ctx);
                !inner.is_zero_lit(self.ctx)
            }
            _ => false,
        };
        let fmt = self.pp_level(l);
        if composite {
            paren(fmt)
        } else {
            fmt
        }
    }

    // ------------------------------------------------------------------
    // Notation matching
    // ------------------------------------------------------------------

    fn match_level(&mut self, p: LevelPtr<'t>, l: LevelPtr<'t>) -> bool {
        if p == l {
            return true
        }
        if self.options.universes {
            // with universes displayed, only strict equality re-parses
            return false
        }
        if is_placeholder_level(p, self.ctx) {
            return true
        }
        match self.ctx.read_level_pair(p, l) {
            (Level::Succ(a, ..), Level::Succ(b, ..)) => self.match_level(a, b),
            _ => false,
        }
    }

    /// Match a notation pattern against a term, binding pattern variables
    /// into `args` (slot positions correspond to de Bruijn indices from the
    /// right).
    fn match_expr(&mut self, p: ExprPtr<'t>, e: ExprPtr<'t>, args: &mut Vec<Option<ExprPtr<'t>>>) -> bool {
        if p.is_explicit(self.ctx) {
            return match p.annotation_arg(self.ctx) {
                Some(inner) => self.match_expr(inner, e, args),
                None => false,
            }
        }
        if let Var { dbj_idx, .. } = self.ctx.read_expr(p) {
            let vidx = dbj_idx as usize;
            if vidx >= args.len() {
                return false
            }
            let i = args.len() - vidx - 1;
            return match args[i] {
                Some(bound) => bound == e,
                None => {
                    args[i] = Some(e);
                    true
                }
            }
        }
        if p.is_placeholder(self.ctx) {
            return true
        }
        if let (Some((pn, pls)), Some((en, els))) = (p.try_const_info(self.ctx), e.try_const_info(self.ctx)) {
            if pn != en {
                return false
            }
            let pls = self.ctx.read_levels(pls);
            let els = self.ctx.read_levels(els);
            // the term must carry at least as many universe arguments as
            // the pattern
            if pls.len() > els.len() {
                return false
            }
            for (a, b) in pls.iter().copied().zip(els.iter().copied()) {
                if !self.match_level(a, b) {
                    return false
                }
            }
            return true
        }
        if let Sort { level: pl, .. } = self.ctx.read_expr(p) {
            return match self.ctx.read_expr(e) {
                Sort { level: el, .. } => self.match_level(pl, el),
                _ => false,
            }
        }
        if e.is_app(self.ctx) {
            let (p_fn, p_args) = p.unfold_apps(self.ctx);
            let (e_fn, e_args) = e.unfold_apps(self.ctx);
            if !self.match_expr(p_fn, e_fn, args) {
                return false
            }
            if p_fn.is_explicit(self.ctx) {
                if p_args.len() != e_args.len() {
                    return false
                }
                for (pa, ea) in p_args.iter().copied().zip(e_args.iter().copied()) {
                    if !self.match_expr(pa, ea, args) {
                        return false
                    }
                }
                return true
            }
            // pattern arguments only face the explicit positions of the
            // head's telescope; implicit positions in the term are skipped
            let mut fn_type = match self.ctx.with_tc(|tc| tc.infer(e_fn)) {
                Ok(t) => t,
                Err(_) => return false,
            };
            let mut j = 0usize;
            for ea in e_args.iter().copied() {
                fn_type = match self.ctx.with_tc(|tc| tc.ensure_pi(fn_type)) {
                    Ok(t) => t,
                    Err(_) => return false,
                };
                let (style, body) = match self.ctx.read_expr(fn_type) {
                    Pi { binder_style, body, .. } => (binder_style, body),
                    _ => return false,
                };
                if style.is_explicit() {
                    if j >= p_args.len() {
                        return false
                    }
                    if !self.match_expr(p_args[j], ea, args) {
                        return false
                    }
                    j += 1;
                }
                fn_type = body.inst1(ea, self.ctx);
            }
            return j == p_args.len()
        }
        false
    }

    // ------------------------------------------------------------------
    // Notation rendering
    // ------------------------------------------------------------------

    fn token_prec(&self, token: StringPtr<'t>) -> u32 { self.ctx.env.token_prec(token).unwrap_or(0) }

    /// Emit a matched entry right-to-left, so the rightmost transition
    /// determines the result's right binding power and the leftmost token
    /// its left binding power.
    fn pp_notation_entry(
        &mut self,
        entry: &NotationEntry<'t>,
        args: &mut Vec<Option<ExprPtr<'t>>>,
    ) -> Option<PpResult> {
        if let Some(num) = entry.num {
            let n = self.ctx.read_bignum(num);
            return Some(PpResult::of_doc(n.to_string()))
        }
        let ts = entry.transitions.clone();
        let mut fmt = DocPtr::from("");
        let mut last_rbp = MAX_BP - 1;
        let mut token_lbp = 0u32;
        let mut last = true;
        for t in ts.iter().rev() {
            let token_fmt = DocPtr::from(self.ctx.read_string(t.token).to_string());
            let curr = match t.action {
                Action::Skip => {
                    if last {
                        last_rbp = self.token_prec(t.token);
                    }
                    token_fmt
                }
                Action::Expr { rbp } => {
                    let e = match args.pop() {
                        Some(Some(e)) => e,
                        _ => return None,
                    };
                    let e_r = self.pp_notation_child(e, token_lbp, rbp);
                    if last {
                        last_rbp = rbp;
                    }
                    token_fmt.concat(space()).concat(e_r.doc())
                }
                Action::Exprs
                | Action::Binder
                | Action::Binders
                | Action::ScopedExpr
                | Action::Ext
                | Action::LuaExt => return None,
            };
            token_lbp = self.token_prec(t.token);
            if last {
                fmt = curr;
                last = false;
            } else {
                fmt = curr.concat(space()).concat(fmt);
            }
        }
        let first_lbp = token_lbp;
        if !entry.is_nud {
            debug_assert!(!last);
            if args.len() != 1 {
                return None
            }
            let e = match args.pop() {
                Some(Some(e)) => e,
                _ => return None,
            };
            let e_fmt = self.pp_notation_child(e, token_lbp, 0).doc();
            fmt = e_fmt.concat(space()).concat(fmt);
        }
        Some(PpResult::new(first_lbp, last_rbp, fmt))
    }

    /// Return the number of parameter slots a notation entry binds.
    fn num_parameters(entry: &NotationEntry<'t>) -> usize {
        if entry.is_numeral() {
            return 0
        }
        let mut r = if entry.is_nud { 0 } else { 1 };
        for t in entry.transitions.iter() {
            match t.action {
                Action::Skip | Action::Binder | Action::Binders => {}
                Action::Expr { .. } | Action::Exprs | Action::ScopedExpr | Action::Ext | Action::LuaExt => r += 1,
            }
        }
        r
    }

    fn pp_notation(&mut self, e: ExprPtr<'t>) -> Option<PpResult> {
        if !self.options.notation || e.is_var(self.ctx) {
            return None
        }
        let head = e.unfold_apps_fun(self.ctx);
        let (head_name, _) = head.try_const_info(self.ctx)?;
        let entries: Vec<NotationEntry<'t>> = self.ctx.env.notation_entries(head_name).to_vec();
        for entry in entries.iter() {
            if !self.options.unicode && !entry.safe_ascii {
                // unicode support is off; ignore this declaration
                continue
            }
            let num_params = Self::num_parameters(entry);
            let mut args: Vec<Option<ExprPtr<'t>>> = vec![None; num_params];
            if self.match_expr(entry.pattern, e, &mut args) {
                if let Some(r) = self.pp_notation_entry(entry, &mut args) {
                    return Some(r)
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------

    pub fn pp(&mut self, e: ExprPtr<'t>) -> PpResult {
        if self.depth > self.options.max_depth || self.num_steps > self.options.max_steps {
            let ell = if self.options.unicode { self.tokens.ellipsis_n.clone() } else { self.tokens.ellipsis.clone() };
            return PpResult::of_doc(ell)
        }
        self.depth += 1;
        self.num_steps += 1;
        let r = self.pp_core(e);
        self.depth -= 1;
        r
    }

    fn pp_core(&mut self, e: ExprPtr<'t>) -> PpResult {
        if let Some(r) = self.pp_notation(e) {
            return r
        }
        if e.is_placeholder(self.ctx) {
            return PpResult::of_doc(self.tokens.placeholder.clone())
        }
        if e.is_show(self.ctx) {
            return self.pp_show(e)
        }
        if e.is_have(self.ctx) {
            return self.pp_have(e)
        }
        if e.is_let(self.ctx) {
            return self.pp_let(e)
        }
        if e.is_typed_expr(self.ctx) {
            if let Some(inner) = e.typed_expr_expr(self.ctx) {
                return self.pp(inner)
            }
        }
        if e.is_let_value(self.ctx) {
            if let Some(inner) = e.annotation_arg(self.ctx) {
                return self.pp(inner)
            }
        }
        if let Some(n) = e.to_num(self.ctx) {
            return self.pp_num(n)
        }
        if !self.options.metavar_args {
            let head = e.unfold_apps_fun(self.ctx);
            if matches!(self.ctx.read_expr(head), Meta { .. }) {
                return self.pp_meta(head)
            }
        }

        match self.ctx.read_expr(e) {
            Var { dbj_idx, .. } => self.pp_var(dbj_idx),
            Sort { level, .. } => self.pp_sort(level),
            Const { name, levels, .. } => self.pp_const(name, levels),
            Meta { .. } => self.pp_meta(e),
            Local { .. } => self.pp_local(e),
            App { .. } => self.pp_app(e),
            Lambda { .. } => self.pp_lambda(e),
            Pi { .. } => self.pp_pi(e),
            Macro { .. } => self.pp_macro(e),
        }
    }

    /// Pretty print an expression to a layout document. Budgets, purification
    /// tables, and metavariable numbering reset on every call, so numbering is
    /// deterministic under a fixed traversal order of the input.
    pub fn pp_expr(&mut self, e: ExprPtr<'t>) -> DocPtr {
        self.depth = 0;
        self.num_steps = 0;
        self.next_meta_idx = 1;
        self.purify_meta_table.clear();
        self.purify_local_table.clear();
        self.purify_used_locals.clear();
        let e = if self.options.beta { e.beta_reduce(self.ctx) } else { e };
        let purified = self.purify(e);
        self.pp_child(purified, 0).doc()
    }

    /// Pretty print an expression and render it at the configured width.
    pub fn render_expr(&mut self, e: ExprPtr<'t>) -> String {
        self.pp_expr(e).group().render(self.options.width)
    }
}

/// A shareable formatter over one underlying printer; each call updates the
/// option snapshot, then prints. One formatter serves one thread; parallel
/// formatting wants one printer per thread, since the purification tables
/// and budget counters are mutable state.
pub struct Formatter<'x, 't, 'p> {
    pp: PrettyPrinter<'x, 't, 'p>,
}

impl<'x, 't, 'p: 't> Formatter<'x, 't, 'p> {
    pub fn new(ctx: &'x mut TermCtx<'t, 'p>, options: PpOptions) -> Self {
        Self { pp: PrettyPrinter::new(ctx, options) }
    }

    pub fn format(&mut self, e: ExprPtr<'t>, options: PpOptions) -> DocPtr {
        self.pp.set_options(options);
        self.pp.pp_expr(e)
    }

    pub fn format_str(&mut self, e: ExprPtr<'t>, options: PpOptions) -> String {
        self.pp.set_options(options);
        self.pp.render_expr(e)
    }
}

/// Build a formatter factory closure product in one step.
pub fn mk_formatter<'x, 't, 'p: 't>(ctx: &'x mut TermCtx<'t, 'p>, options: PpOptions) -> Formatter<'x, 't, 'p> {
    Formatter::new(ctx, options)
}
