//! Implementation of the kernel `Expr` type and the term surgery the
//! printer performs on it.
//!
//! Surface forms the parser elaborates away (`@`-explicit marking, `have`,
//! `show`, `let`, `let_value`, `typed_expr`) are represented as annotation
//! macros: a `Macro` with a recognized marker name and a single argument.
//! `have n : T, from pf, body` is `App(Annot(have, λ n : T, body), pf)`;
//! `show T, from pf` is `Annot(show, App(λ _ : T, #0, pf))`; and
//! `let n := v in b` is `App(Annot(let, λ n : T, b), v)`.
use crate::hash64;
use crate::name::str1;
use crate::util::{ExprPtr, ExprsPtr, IsCtx, LevelPtr, LevelsPtr, NamePtr};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use BinderStyle::*;
use Expr::*;

pub(crate) const VAR_HASH: u64 = 389;
pub(crate) const SORT_HASH: u64 = 499;
pub(crate) const CONST_HASH: u64 = 739;
pub(crate) const META_HASH: u64 = 1381;
pub(crate) const LOCAL_HASH: u64 = 1181;
pub(crate) const APP_HASH: u64 = 883;
pub(crate) const LAMBDA_HASH: u64 = 1021;
pub(crate) const PI_HASH: u64 = 1033;
pub(crate) const MACRO_HASH: u64 = 1697;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderStyle {
    /// `(x : A)`
    Default,
    /// `{x : A}`
    Implicit,
    /// `⦃x : A⦄`, or `{{x : A}}` without unicode
    StrictImplicit,
    /// `[x : A]`
    InstImplicit,
    /// Brackets like `Default`, but marks `have` bindings as `[visible]`.
    Contextual,
}

impl BinderStyle {
    /// Whether an argument at a binder of this style is inserted by
    /// elaboration rather than written by the user.
    pub fn is_implicit(self) -> bool { matches!(self, Implicit | StrictImplicit | InstImplicit) }

    pub fn is_explicit(self) -> bool { !self.is_implicit() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr<'a> {
    Var {
        dbj_idx: u16,
        hash: u64,
    },
    Sort {
        level: LevelPtr<'a>,
        has_umvars: bool,
        hash: u64,
    },
    Const {
        name: NamePtr<'a>,
        levels: LevelsPtr<'a>,
        has_umvars: bool,
        hash: u64,
    },
    Meta {
        name: NamePtr<'a>,
        ty: ExprPtr<'a>,
        hash: u64,
    },
    Local {
        /// The internal name; unique, and the key the purifier renames by.
        name: NamePtr<'a>,
        /// The user-visible name; what the printer emits.
        pp_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        hash: u64,
    },
    App {
        fun: ExprPtr<'a>,
        arg: ExprPtr<'a>,
        num_loose_bvars: u16,
        has_fvars: bool,
        has_emvars: bool,
        has_umvars: bool,
        hash: u64,
    },
    Lambda {
        binder_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        body: ExprPtr<'a>,
        num_loose_bvars: u16,
        has_fvars: bool,
        has_emvars: bool,
        has_umvars: bool,
        hash: u64,
    },
    Pi {
        binder_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        body: ExprPtr<'a>,
        num_loose_bvars: u16,
        has_fvars: bool,
        has_emvars: bool,
        has_umvars: bool,
        hash: u64,
    },
    Macro {
        m_name: NamePtr<'a>,
        args: ExprsPtr<'a>,
        num_loose_bvars: u16,
        has_fvars: bool,
        has_emvars: bool,
        has_umvars: bool,
        hash: u64,
    },
}

impl<'a> Expr<'a> {
    fn get_hash(&self) -> u64 {
        match self {
            Var { hash, .. }
            | Sort { hash, .. }
            | Const { hash, .. }
            | Meta { hash, .. }
            | Local { hash, .. }
            | App { hash, .. }
            | Lambda { hash, .. }
            | Pi { hash, .. }
            | Macro { hash, .. } => *hash,
        }
    }
}

impl<'a> std::hash::Hash for Expr<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

impl<'a> ExprPtr<'a> {
    /// The number of distinct loose bound variables; `0` means closed.
    pub fn num_loose_bvars(self, ctx: &impl IsCtx<'a>) -> u16 {
        match ctx.read_expr(self) {
            Var { dbj_idx, .. } => dbj_idx + 1,
            Sort { .. } | Const { .. } => 0,
            Meta { ty, .. } => ty.num_loose_bvars(ctx),
            Local { binder_type, .. } => binder_type.num_loose_bvars(ctx),
            App { num_loose_bvars, .. }
            | Lambda { num_loose_bvars, .. }
            | Pi { num_loose_bvars, .. }
            | Macro { num_loose_bvars, .. } => num_loose_bvars,
        }
    }

    pub fn closed(self, ctx: &impl IsCtx<'a>) -> bool { self.num_loose_bvars(ctx) == 0 }

    /// Does the expression contain a local constant anywhere.
    pub fn has_fvars(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Var { .. } | Sort { .. } | Const { .. } => false,
            Meta { ty, .. } => ty.has_fvars(ctx),
            Local { .. } => true,
            App { has_fvars, .. } | Lambda { has_fvars, .. } | Pi { has_fvars, .. } | Macro { has_fvars, .. } =>
                has_fvars,
        }
    }

    /// Does the expression contain a term metavariable anywhere.
    pub fn has_emvars(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Var { .. } | Sort { .. } | Const { .. } => false,
            Meta { .. } => true,
            Local { binder_type, .. } => binder_type.has_emvars(ctx),
            App { has_emvars, .. } | Lambda { has_emvars, .. } | Pi { has_emvars, .. } | Macro { has_emvars, .. } =>
                has_emvars,
        }
    }

    /// Does the expression contain a universe metavariable anywhere.
    pub fn has_umvars(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Var { .. } => false,
            Sort { has_umvars, .. } | Const { has_umvars, .. } => has_umvars,
            Meta { ty, .. } => ty.has_umvars(ctx),
            Local { binder_type, .. } => binder_type.has_umvars(ctx),
            App { has_umvars, .. } | Lambda { has_umvars, .. } | Pi { has_umvars, .. } | Macro { has_umvars, .. } =>
                has_umvars,
        }
    }

    pub fn is_app(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_expr(self), App { .. }) }

    pub fn is_var(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_expr(self), Var { .. }) }

    pub fn is_lambda(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_expr(self), Lambda { .. }) }

    pub fn is_pi(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_expr(self), Pi { .. }) }

    pub fn try_app(self, ctx: &impl IsCtx<'a>) -> Option<(ExprPtr<'a>, ExprPtr<'a>)> {
        match ctx.read_expr(self) {
            App { fun, arg, .. } => Some((fun, arg)),
            _ => None,
        }
    }

    pub fn try_const_info(self, ctx: &impl IsCtx<'a>) -> Option<(NamePtr<'a>, LevelsPtr<'a>)> {
        match ctx.read_expr(self) {
            Const { name, levels, .. } => Some((name, levels)),
            _ => None,
        }
    }

    /// Takes just the function from `unfold_apps`; slightly more efficient
    /// when the arguments aren't needed.
    pub fn unfold_apps_fun(self, ctx: &impl IsCtx<'a>) -> Self {
        match ctx.read_expr(self) {
            App { fun, .. } => fun.unfold_apps_fun(ctx),
            _ => self,
        }
    }

    /// From `(((f a) b) c)`, produces `(f, [a, b, c])`.
    pub fn unfold_apps(self, ctx: &impl IsCtx<'a>) -> (Self, Vec<ExprPtr<'a>>) {
        match ctx.read_expr(self) {
            App { fun, arg, .. } => {
                let (f, mut args) = fun.unfold_apps(ctx);
                args.push(arg);
                (f, args)
            }
            _ => (self, Vec::new()),
        }
    }

    /// The inverse of `unfold_apps`; `f.fold_apps(&[a, b, c])` is `(((f a) b) c)`.
    pub fn fold_apps(self, args: &[ExprPtr<'a>], ctx: &mut impl IsCtx<'a>) -> Self {
        let mut out = self;
        for arg in args.iter().copied() {
            out = out.new_app(arg, ctx);
        }
        out
    }

    pub fn new_var(dbj_idx: u16, ctx: &mut impl IsCtx<'a>) -> Self {
        let hash = hash64!(VAR_HASH, dbj_idx);
        ctx.alloc_expr(Var { dbj_idx, hash })
    }

    pub fn new_sort(level: LevelPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        let hash = hash64!(SORT_HASH, level);
        let has_umvars = level.has_meta(ctx);
        ctx.alloc_expr(Sort { level, has_umvars, hash })
    }

    pub fn new_const(name: NamePtr<'a>, levels: LevelsPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        let hash = hash64!(CONST_HASH, name, levels);
        let has_umvars = ctx.read_levels(levels).iter().any(|l| l.has_meta(ctx));
        ctx.alloc_expr(Const { name, levels, has_umvars, hash })
    }

    pub fn new_meta(name: NamePtr<'a>, ty: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        let hash = hash64!(META_HASH, name, ty);
        ctx.alloc_expr(Meta { name, ty, hash })
    }

    pub fn new_local(
        name: NamePtr<'a>,
        pp_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        ctx: &mut impl IsCtx<'a>,
    ) -> Self {
        let hash = hash64!(LOCAL_HASH, name, pp_name, binder_style, binder_type);
        ctx.alloc_expr(Local { name, pp_name, binder_style, binder_type, hash })
    }

    pub fn new_app(self, arg: Self, ctx: &mut impl IsCtx<'a>) -> Self {
        let hash = hash64!(APP_HASH, self, arg);
        let num_loose_bvars = self.num_loose_bvars(ctx).max(arg.num_loose_bvars(ctx));
        let has_fvars = self.has_fvars(ctx) || arg.has_fvars(ctx);
        let has_emvars = self.has_emvars(ctx) || arg.has_emvars(ctx);
        let has_umvars = self.has_umvars(ctx) || arg.has_umvars(ctx);
        ctx.alloc_expr(App { fun: self, arg, num_loose_bvars, has_fvars, has_emvars, has_umvars, hash })
    }

    pub fn new_lambda(
        binder_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        body: ExprPtr<'a>,
        ctx: &mut impl IsCtx<'a>,
    ) -> Self {
        let hash = hash64!(LAMBDA_HASH, binder_name, binder_style, binder_type, body);
        let num_loose_bvars = binder_type.num_loose_bvars(ctx).max(body.num_loose_bvars(ctx).saturating_sub(1));
        let has_fvars = binder_type.has_fvars(ctx) || body.has_fvars(ctx);
        let has_emvars = binder_type.has_emvars(ctx) || body.has_emvars(ctx);
        let has_umvars = binder_type.has_umvars(ctx) || body.has_umvars(ctx);
        ctx.alloc_expr(Lambda {
            binder_name,
            binder_style,
            binder_type,
            body,
            num_loose_bvars,
            has_fvars,
            has_emvars,
            has_umvars,
            hash,
        })
    }

    pub fn new_pi(
        binder_name: NamePtr<'a>,
        binder_style: BinderStyle,
        binder_type: ExprPtr<'a>,
        body: ExprPtr<'a>,
        ctx: &mut impl IsCtx<'a>,
    ) -> Self {
        let hash = hash64!(PI_HASH, binder_name, binder_style, binder_type, body);
        let num_loose_bvars = binder_type.num_loose_bvars(ctx).max(body.num_loose_bvars(ctx).saturating_sub(1));
        let has_fvars = binder_type.has_fvars(ctx) || body.has_fvars(ctx);
        let has_emvars = binder_type.has_emvars(ctx) || body.has_emvars(ctx);
        let has_umvars = binder_type.has_umvars(ctx) || body.has_umvars(ctx);
        ctx.alloc_expr(Pi {
            binder_name,
            binder_style,
            binder_type,
            body,
            num_loose_bvars,
            has_fvars,
            has_emvars,
            has_umvars,
            hash,
        })
    }

    pub fn new_macro(m_name: NamePtr<'a>, args: &[ExprPtr<'a>], ctx: &mut impl IsCtx<'a>) -> Self {
        let num_loose_bvars = args.iter().map(|a| a.num_loose_bvars(ctx)).max().unwrap_or(0);
        let has_fvars = args.iter().any(|a| a.has_fvars(ctx));
        let has_emvars = args.iter().any(|a| a.has_emvars(ctx));
        let has_umvars = args.iter().any(|a| a.has_umvars(ctx));
        let args = ctx.alloc_exprs_slice(args);
        let hash = hash64!(MACRO_HASH, m_name, args);
        ctx.alloc_expr(Macro { m_name, args, num_loose_bvars, has_fvars, has_emvars, has_umvars, hash })
    }

    /// Instantiate loose bound variables with `substs`, where the final
    /// element of `substs` replaces `Var(0)`; all substitutes must be closed.
    pub fn inst(self, substs: &[ExprPtr<'a>], ctx: &mut impl IsCtx<'a>) -> Self {
        fn inst_aux<'a>(
            e: ExprPtr<'a>,
            substs: &[ExprPtr<'a>],
            offset: u16,
            ctx: &mut impl IsCtx<'a>,
        ) -> ExprPtr<'a> {
            if e.num_loose_bvars(ctx) <= offset {
                return e
            }
            match ctx.read_expr(e) {
                Var { dbj_idx, .. } => {
                    let k = (dbj_idx - offset) as usize;
                    if k < substs.len() {
                        substs[substs.len() - 1 - k]
                    } else {
                        e
                    }
                }
                App { fun, arg, .. } => {
                    let fun = inst_aux(fun, substs, offset, ctx);
                    let arg = inst_aux(arg, substs, offset, ctx);
                    fun.new_app(arg, ctx)
                }
                Lambda { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = inst_aux(binder_type, substs, offset, ctx);
                    let body = inst_aux(body, substs, offset + 1, ctx);
                    <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, ctx)
                }
                Pi { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = inst_aux(binder_type, substs, offset, ctx);
                    let body = inst_aux(body, substs, offset + 1, ctx);
                    <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, ctx)
                }
                Macro { m_name, args, .. } => {
                    let args = ctx
                        .read_exprs(args)
                        .iter()
                        .map(|a| inst_aux(*a, substs, offset, ctx))
                        .collect::<Vec<_>>();
                    <ExprPtr>::new_macro(m_name, args.as_slice(), ctx)
                }
                Sort { .. } | Const { .. } | Meta { .. } | Local { .. } => e,
            }
        }

        if self.num_loose_bvars(ctx) == 0 {
            self
        } else {
            inst_aux(self, substs, 0u16, ctx)
        }
    }

    pub fn inst1(self, subst: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self { self.inst(&[subst], ctx) }

    /// Abstract occurrences of the (closed) expression `target`, replacing
    /// each with a bound variable pointing just above the root.
    pub fn abstr_expr(self, target: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        fn abstr_aux<'a>(
            e: ExprPtr<'a>,
            target: ExprPtr<'a>,
            offset: u16,
            ctx: &mut impl IsCtx<'a>,
        ) -> ExprPtr<'a> {
            if e == target {
                return <ExprPtr>::new_var(offset, ctx)
            }
            match ctx.read_expr(e) {
                Var { .. } | Sort { .. } | Const { .. } | Meta { .. } | Local { .. } => e,
                App { fun, arg, .. } => {
                    let fun = abstr_aux(fun, target, offset, ctx);
                    let arg = abstr_aux(arg, target, offset, ctx);
                    fun.new_app(arg, ctx)
                }
                Lambda { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = abstr_aux(binder_type, target, offset, ctx);
                    let body = abstr_aux(body, target, offset + 1, ctx);
                    <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, ctx)
                }
                Pi { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = abstr_aux(binder_type, target, offset, ctx);
                    let body = abstr_aux(body, target, offset + 1, ctx);
                    <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, ctx)
                }
                Macro { m_name, args, .. } => {
                    let args = ctx
                        .read_exprs(args)
                        .iter()
                        .map(|a| abstr_aux(*a, target, offset, ctx))
                        .collect::<Vec<_>>();
                    <ExprPtr>::new_macro(m_name, args.as_slice(), ctx)
                }
            }
        }
        abstr_aux(self, target, 0u16, ctx)
    }

    /// Abstract occurrences of a local constant, replacing each with a bound
    /// variable pointing just above the root.
    pub fn abstr1(self, local: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        if !self.has_fvars(ctx) {
            self
        } else {
            self.abstr_expr(local, ctx)
        }
    }

    /// Does `self` contain a bound variable with de Bruijn index `i`.
    pub fn has_loose_bvar(self, i: u16, ctx: &impl IsCtx<'a>) -> bool {
        if self.num_loose_bvars(ctx) <= i {
            return false
        }
        match ctx.read_expr(self) {
            Var { dbj_idx, .. } => dbj_idx == i,
            App { fun, arg, .. } => fun.has_loose_bvar(i, ctx) || arg.has_loose_bvar(i, ctx),
            Pi { binder_type, body, .. } | Lambda { binder_type, body, .. } =>
                binder_type.has_loose_bvar(i, ctx) || body.has_loose_bvar(i + 1, ctx),
            Macro { args, .. } => ctx.read_exprs(args).iter().any(|a| a.has_loose_bvar(i, ctx)),
            Sort { .. } | Const { .. } | Meta { .. } | Local { .. } => false,
        }
    }

    /// Shift every loose bound variable down by one. The caller guarantees the
    /// binder being discarded is vacuous, so index `offset` itself never occurs.
    pub(crate) fn lower_loose_bvars1(self, ctx: &mut impl IsCtx<'a>) -> Self {
        fn lower_aux<'a>(e: ExprPtr<'a>, offset: u16, ctx: &mut impl IsCtx<'a>) -> ExprPtr<'a> {
            if e.num_loose_bvars(ctx) <= offset {
                return e
            }
            match ctx.read_expr(e) {
                Var { dbj_idx, .. } => {
                    debug_assert!(dbj_idx > offset);
                    <ExprPtr>::new_var(dbj_idx - 1, ctx)
                }
                App { fun, arg, .. } => {
                    let fun = lower_aux(fun, offset, ctx);
                    let arg = lower_aux(arg, offset, ctx);
                    fun.new_app(arg, ctx)
                }
                Lambda { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = lower_aux(binder_type, offset, ctx);
                    let body = lower_aux(body, offset + 1, ctx);
                    <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, ctx)
                }
                Pi { binder_name, binder_style, binder_type, body, .. } => {
                    let binder_type = lower_aux(binder_type, offset, ctx);
                    let body = lower_aux(body, offset + 1, ctx);
                    <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, ctx)
                }
                Macro { m_name, args, .. } => {
                    let args =
                        ctx.read_exprs(args).iter().map(|a| lower_aux(*a, offset, ctx)).collect::<Vec<_>>();
                    <ExprPtr>::new_macro(m_name, args.as_slice(), ctx)
                }
                Sort { .. } | Const { .. } | Meta { .. } | Local { .. } => e,
            }
        }
        lower_aux(self, 0u16, ctx)
    }

    /// Reduce all beta redexes, including under binders and inside macro
    /// arguments.
    pub fn beta_reduce(self, ctx: &mut impl IsCtx<'a>) -> Self {
        match ctx.read_expr(self) {
            Var { .. } | Sort { .. } | Const { .. } | Meta { .. } | Local { .. } => self,
            App { .. } => {
                let (f, args) = self.unfold_apps(ctx);
                let args = args.iter().map(|a| a.beta_reduce(ctx)).collect::<Vec<_>>();
                let mut f = f.beta_reduce(ctx);
                let mut consumed = 0usize;
                while consumed < args.len() {
                    match ctx.read_expr(f) {
                        Lambda { body, .. } => {
                            f = body.inst1(args[consumed], ctx);
                            consumed += 1;
                        }
                        _ => break,
                    }
                }
                let applied = f.fold_apps(&args[consumed..], ctx);
                if consumed > 0 {
                    applied.beta_reduce(ctx)
                } else {
                    applied
                }
            }
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = binder_type.beta_reduce(ctx);
                let body = body.beta_reduce(ctx);
                <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, ctx)
            }
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = binder_type.beta_reduce(ctx);
                let body = body.beta_reduce(ctx);
                <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, ctx)
            }
            Macro { m_name, args, .. } => {
                let args = ctx.read_exprs(args).iter().map(|a| a.beta_reduce(ctx)).collect::<Vec<_>>();
                <ExprPtr>::new_macro(m_name, args.as_slice(), ctx)
            }
        }
    }

    /// Return `self [ks |-> vs]`, substituting universe parameters in every
    /// `Sort` and `Const` level position.
    pub fn subst_level_params(self, ks: LevelsPtr<'a>, vs: LevelsPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        if !self.has_level_params(ctx) {
            return self
        }
        let ks = ctx.read_levels(ks);
        let vs = ctx.read_levels(vs);
        self.subst_level_params_aux(ks.as_ref(), vs.as_ref(), ctx)
    }

    fn has_level_params(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Var { .. } => false,
            Sort { .. } | Const { .. } => true,
            Meta { ty, .. } => ty.has_level_params(ctx),
            Local { binder_type, .. } => binder_type.has_level_params(ctx),
            App { fun, arg, .. } => fun.has_level_params(ctx) || arg.has_level_params(ctx),
            Lambda { binder_type, body, .. } | Pi { binder_type, body, .. } =>
                binder_type.has_level_params(ctx) || body.has_level_params(ctx),
            Macro { args, .. } => ctx.read_exprs(args).iter().any(|a| a.has_level_params(ctx)),
        }
    }

    fn subst_level_params_aux(
        self,
        ks: &[LevelPtr<'a>],
        vs: &[LevelPtr<'a>],
        ctx: &mut impl IsCtx<'a>,
    ) -> Self {
        match ctx.read_expr(self) {
            Var { .. } => self,
            Sort { level, .. } => {
                let level = level.subst_params(ks, vs, ctx);
                <ExprPtr>::new_sort(level, ctx)
            }
            Const { name, levels, .. } => {
                let levels =
                    ctx.read_levels(levels).iter().map(|l| l.subst_params(ks, vs, ctx)).collect::<Vec<_>>();
                let levels = ctx.alloc_levels_slice(levels.as_slice());
                <ExprPtr>::new_const(name, levels, ctx)
            }
            Meta { name, ty, .. } => {
                let ty = ty.subst_level_params_aux(ks, vs, ctx);
                <ExprPtr>::new_meta(name, ty, ctx)
            }
            Local { name, pp_name, binder_style, binder_type, .. } => {
                let binder_type = binder_type.subst_level_params_aux(ks, vs, ctx);
                <ExprPtr>::new_local(name, pp_name, binder_style, binder_type, ctx)
            }
            App { fun, arg, .. } => {
                let fun = fun.subst_level_params_aux(ks, vs, ctx);
                let arg = arg.subst_level_params_aux(ks, vs, ctx);
                fun.new_app(arg, ctx)
            }
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = binder_type.subst_level_params_aux(ks, vs, ctx);
                let body = body.subst_level_params_aux(ks, vs, ctx);
                <ExprPtr>::new_lambda(binder_name, binder_style, binder_type, body, ctx)
            }
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = binder_type.subst_level_params_aux(ks, vs, ctx);
                let body = body.subst_level_params_aux(ks, vs, ctx);
                <ExprPtr>::new_pi(binder_name, binder_style, binder_type, body, ctx)
            }
            Macro { m_name, args, .. } => {
                let args = ctx
                    .read_exprs(args)
                    .iter()
                    .map(|a| a.subst_level_params_aux(ks, vs, ctx))
                    .collect::<Vec<_>>();
                <ExprPtr>::new_macro(m_name, args.as_slice(), ctx)
            }
        }
    }

    /// Does any constant named `n` occur in `self`.
    pub fn contains_const(self, n: NamePtr<'a>, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Var { .. } | Sort { .. } => false,
            Const { name, .. } => name == n,
            Meta { ty, .. } => ty.contains_const(n, ctx),
            Local { binder_type, .. } => binder_type.contains_const(n, ctx),
            App { fun, arg, .. } => fun.contains_const(n, ctx) || arg.contains_const(n, ctx),
            Lambda { binder_type, body, .. } | Pi { binder_type, body, .. } =>
                binder_type.contains_const(n, ctx) || body.contains_const(n, ctx),
            Macro { args, .. } => ctx.read_exprs(args).iter().any(|a| a.contains_const(n, ctx)),
        }
    }

    // ------------------------------------------------------------------
    // Annotation macros
    // ------------------------------------------------------------------

    pub fn new_annotation(marker: NamePtr<'a>, inner: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> Self {
        <ExprPtr>::new_macro(marker, &[inner], ctx)
    }

    pub fn is_annotation(self, marker: NamePtr<'a>, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Macro { m_name, args, .. } => m_name == marker && ctx.read_exprs(args).len() == 1,
            _ => false,
        }
    }

    /// The single argument of an annotation macro.
    pub fn annotation_arg(self, ctx: &impl IsCtx<'a>) -> Option<ExprPtr<'a>> {
        match ctx.read_expr(self) {
            Macro { args, .. } => {
                let args = ctx.read_exprs(args);
                match args.as_ref() {
                    [inner] => Some(*inner),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// `@e`: apply `e` without implicit-argument insertion.
    pub fn is_explicit(self, ctx: &impl IsCtx<'a>) -> bool {
        self.is_annotation(ctx.name_cache().explicit_, ctx)
    }

    pub fn new_explicit(self, ctx: &mut impl IsCtx<'a>) -> Self {
        let marker = ctx.name_cache().explicit_;
        <ExprPtr>::new_annotation(marker, self, ctx)
    }

    /// The `_` placeholder constant.
    pub fn is_placeholder(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Const { name, .. } => name == ctx.name_cache().placeholder,
            _ => false,
        }
    }

    /// `have n : T, from pf, body`, encoded as the `have` annotation over a
    /// lambda, applied to the proof.
    pub fn is_have(self, ctx: &impl IsCtx<'a>) -> bool {
        match self.try_app(ctx) {
            Some((fun, _)) => match fun.is_annotation(ctx.name_cache().have_, ctx) {
                true => fun.annotation_arg(ctx).map(|b| b.is_lambda(ctx)).unwrap_or(false),
                false => false,
            },
            None => false,
        }
    }

    /// `show T, from pf`, encoded as the `show` annotation over a one-argument
    /// application of a lambda.
    pub fn is_show(self, ctx: &impl IsCtx<'a>) -> bool {
        if !self.is_annotation(ctx.name_cache().show_, ctx) {
            return false
        }
        match self.annotation_arg(ctx).and_then(|s| s.try_app(ctx)) {
            Some((fun, _)) => fun.is_lambda(ctx),
            None => false,
        }
    }

    /// `let n := v in b`, encoded as the `let` annotation over a lambda,
    /// applied to the value.
    pub fn is_let(self, ctx: &impl IsCtx<'a>) -> bool {
        match self.try_app(ctx) {
            Some((fun, _)) => match fun.is_annotation(ctx.name_cache().let_, ctx) {
                true => fun.annotation_arg(ctx).map(|b| b.is_lambda(ctx)).unwrap_or(false),
                false => false,
            },
            None => false,
        }
    }

    /// The pieces of a `let`: binder name, value, and the body with the value
    /// substituted in (so the body is closed whenever the input is).
    pub fn let_parts(self, ctx: &mut impl IsCtx<'a>) -> Option<(NamePtr<'a>, ExprPtr<'a>, ExprPtr<'a>)> {
        let (fun, val) = self.try_app(ctx)?;
        let binding = fun.annotation_arg(ctx)?;
        match ctx.read_expr(binding) {
            Lambda { binder_name, body, .. } => Some((binder_name, val, body.inst1(val, ctx))),
            _ => None,
        }
    }

    pub fn is_typed_expr(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_expr(self) {
            Macro { m_name, args, .. } =>
                m_name == ctx.name_cache().typed_expr && ctx.read_exprs(args).len() == 2,
            _ => false,
        }
    }

    /// The expression component of a `typed_expr` macro (`(e : T)` surface
    /// syntax); the type is at index 0, the expression at index 1.
    pub fn typed_expr_expr(self, ctx: &impl IsCtx<'a>) -> Option<ExprPtr<'a>> {
        match ctx.read_expr(self) {
            Macro { args, .. } => ctx.read_exprs(args).get(1).copied(),
            _ => None,
        }
    }

    pub fn is_let_value(self, ctx: &impl IsCtx<'a>) -> bool {
        self.is_annotation(ctx.name_cache().let_value, ctx)
    }

    /// For the surface markers that are transparent to reduction and
    /// inference, the expression they wrap; `None` for everything else.
    pub(crate) fn transparent_inner(self, ctx: &impl IsCtx<'a>) -> Option<ExprPtr<'a>> {
        if self.is_typed_expr(ctx) {
            return self.typed_expr_expr(ctx)
        }
        match ctx.read_expr(self) {
            Macro { m_name, .. } => {
                let nc = ctx.name_cache();
                if m_name == nc.explicit_ || m_name == nc.let_value || m_name == nc.have_ || m_name == nc.show_ || m_name == nc.let_ {
                    self.annotation_arg(ctx)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Numerals
    // ------------------------------------------------------------------

    /// Fold a binary numeral application tree (`zero`, `one`, `bit0 e`,
    /// `bit1 e`) into a bignum; `None` if the tree is not a numeral.
    pub fn to_num(self, ctx: &impl IsCtx<'a>) -> Option<BigUint> {
        let two = BigUint::from(2u8);
        match ctx.read_expr(self) {
            Const { name, .. } if name == ctx.name_cache().zero => Some(BigUint::zero()),
            Const { name, .. } if name == ctx.name_cache().one => Some(BigUint::one()),
            App { fun, arg, .. } => match ctx.read_expr(fun) {
                Const { name, .. } if name == ctx.name_cache().bit0 => arg.to_num(ctx).map(|n| &two * n),
                Const { name, .. } if name == ctx.name_cache().bit1 =>
                    arg.to_num(ctx).map(|n| &two * n + BigUint::one()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Build `let n := v in b` from a body still open in the bound variable.
pub fn mk_let<'a>(
    n: NamePtr<'a>,
    b_type: ExprPtr<'a>,
    val: ExprPtr<'a>,
    open_body: ExprPtr<'a>,
    ctx: &mut impl IsCtx<'a>,
) -> ExprPtr<'a> {
    let binding = <ExprPtr>::new_lambda(n, Default, b_type, open_body, ctx);
    let marker = ctx.name_cache().let_;
    let annotated = <ExprPtr>::new_annotation(marker, binding, ctx);
    annotated.new_app(val, ctx)
}

/// Build `have n : ty, from proof, body` from a body still open in the bound
/// variable. A `Contextual` style marks the hypothesis `[visible]`.
pub fn mk_have<'a>(
    n: NamePtr<'a>,
    ty: ExprPtr<'a>,
    style: BinderStyle,
    proof: ExprPtr<'a>,
    open_body: ExprPtr<'a>,
    ctx: &mut impl IsCtx<'a>,
) -> ExprPtr<'a> {
    let binding = <ExprPtr>::new_lambda(n, style, ty, open_body, ctx);
    let marker = ctx.name_cache().have_;
    let annotated = <ExprPtr>::new_annotation(marker, binding, ctx);
    annotated.new_app(proof, ctx)
}

/// Build `show ty, from proof`.
pub fn mk_show<'a>(ty: ExprPtr<'a>, proof: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> ExprPtr<'a> {
    let n = str1("this", ctx);
    let v0 = <ExprPtr>::new_var(0, ctx);
    let binding = <ExprPtr>::new_lambda(n, Default, ty, v0, ctx);
    let applied = binding.new_app(proof, ctx);
    let marker = ctx.name_cache().show_;
    <ExprPtr>::new_annotation(marker, applied, ctx)
}

/// The `_` placeholder constant.
pub fn mk_placeholder<'a>(ctx: &mut impl IsCtx<'a>) -> ExprPtr<'a> {
    let n = ctx.name_cache().placeholder;
    let levels = ctx.alloc_levels_slice(&[]);
    <ExprPtr>::new_const(n, levels, ctx)
}
