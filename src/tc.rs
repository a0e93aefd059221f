//! The type-inference capability the printer consumes.
//!
//! Inference here is deliberately shallow: the printer only ever asks for the
//! type of an application head (to decide implicit-argument elision and to
//! discriminate argument positions while matching notations) and whether a
//! term lives in `Prop`. Every query can fail, and the printer treats every
//! failure as "no information".
use crate::expr::Expr::*;
use crate::util::LevelPtr;
use crate::name::internal_name;
use crate::util::{ExprPtr, IsCtx, LevelsPtr, TermCtx};

/// A bound on reduction work; hitting it surfaces as an ordinary
/// inference failure.
const WHNF_FUEL: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcErr {
    /// The expression is not closed; loose bound variables have no type.
    LooseBVar,
    /// A constant without a declaration in the ambient environment.
    UnknownConst,
    /// A type that was expected to reduce to a pi did not.
    NotAPi,
    /// A type that was expected to reduce to a sort did not.
    NotASort,
    /// Reduction hit its step bound.
    OutOfFuel,
    /// A macro with no inferable structure.
    OpaqueMacro,
}

impl std::fmt::Display for TcErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TcErr::LooseBVar => write!(f, "cannot infer the type of a loose bound variable"),
            TcErr::UnknownConst => write!(f, "constant has no declaration in this environment"),
            TcErr::NotAPi => write!(f, "expected a pi type"),
            TcErr::NotASort => write!(f, "expected a sort"),
            TcErr::OutOfFuel => write!(f, "reduction exceeded its step bound"),
            TcErr::OpaqueMacro => write!(f, "macro is opaque to inference"),
        }
    }
}

impl std::error::Error for TcErr {}

pub type TcResult<A> = Result<A, TcErr>;

pub struct TypeChecker<'x, 't, 'p> {
    pub(crate) ctx: &'x mut TermCtx<'t, 'p>,
}

impl<'x, 't, 'p: 't> TypeChecker<'x, 't, 'p> {
    pub fn new(ctx: &'x mut TermCtx<'t, 'p>) -> Self { Self { ctx } }

    pub fn infer(&mut self, e: ExprPtr<'t>) -> TcResult<ExprPtr<'t>> {
        match self.ctx.read_expr(e) {
            Var { .. } => Err(TcErr::LooseBVar),
            Sort { level, .. } => {
                let level = level.new_succ(self.ctx);
                Ok(<ExprPtr>::new_sort(level, self.ctx))
            }
            Const { name, levels, .. } => {
                let declar = match self.ctx.env.get_declar(name) {
                    Some(d) => *d,
                    None => return Err(TcErr::UnknownConst),
                };
                let declar_type: ExprPtr<'t> = declar.type_();
                let declar_uparams: LevelsPtr<'t> = declar.uparams();
                Ok(declar_type.subst_level_params(declar_uparams, levels, self.ctx))
            }
            Meta { ty, .. } => Ok(ty),
            Local { binder_type, .. } => Ok(binder_type),
            App { .. } => self.infer_app(e),
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let internal = internal_name(self.ctx);
                let local =
                    <ExprPtr>::new_local(internal, binder_name, binder_style, binder_type, self.ctx);
                let instd = body.inst1(local, self.ctx);
                let body_ty = self.infer(instd)?;
                let abstrd = body_ty.abstr1(local, self.ctx);
                Ok(<ExprPtr>::new_pi(binder_name, binder_style, binder_type, abstrd, self.ctx))
            }
            Pi { .. } => self.infer_pi(e),
            Macro { args, .. } => {
                if e.is_typed_expr(self.ctx) {
                    // the ascription is the type
                    Ok(self.ctx.read_exprs(args)[0])
                } else if let Some(inner) = e.transparent_inner(self.ctx) {
                    self.infer(inner)
                } else {
                    Err(TcErr::OpaqueMacro)
                }
            }
        }
    }

    fn infer_app(&mut self, e: ExprPtr<'t>) -> TcResult<ExprPtr<'t>> {
        let (f, args) = e.unfold_apps(self.ctx);
        let mut fun_type = self.infer(f)?;
        for arg in args {
            fun_type = self.ensure_pi(fun_type)?;
            match self.ctx.read_expr(fun_type) {
                Pi { body, .. } => fun_type = body.inst1(arg, self.ctx),
                _ => unreachable!("ensure_pi returned a non-pi"),
            }
        }
        Ok(fun_type)
    }

    fn infer_pi(&mut self, e: ExprPtr<'t>) -> TcResult<ExprPtr<'t>> {
        let mut locals = Vec::new();
        let mut universes = Vec::new();
        let mut cursor = e;
        while let Pi { binder_name, binder_style, binder_type, body, .. } = self.ctx.read_expr(cursor) {
            let binder_type = binder_type.inst(locals.as_slice(), self.ctx);
            let dom_univ = self.infer_sort_of(binder_type)?;
            universes.push(dom_univ);
            let internal = internal_name(self.ctx);
            let local = <ExprPtr>::new_local(internal, binder_name, binder_style, binder_type, self.ctx);
            locals.push(local);
            cursor = body;
        }
        let instd = cursor.inst(locals.as_slice(), self.ctx);
        let mut infd = self.infer_sort_of(instd)?;
        while let Some(hd) = universes.pop() {
            infd = hd.new_imax(infd, self.ctx);
        }
        Ok(<ExprPtr>::new_sort(infd, self.ctx))
    }

    fn infer_sort_of(&mut self, e: ExprPtr<'t>) -> TcResult<LevelPtr<'t>> {
        let infd = self.infer(e)?;
        let whnfd = self.whnf(infd)?;
        match self.ctx.read_expr(whnfd) {
            Sort { level, .. } => Ok(level),
            _ => Err(TcErr::NotASort),
        }
    }

    /// Weak head normal form: head beta, definition unfolding, and surface
    /// marker stripping, bounded by `WHNF_FUEL`.
    pub fn whnf(&mut self, e: ExprPtr<'t>) -> TcResult<ExprPtr<'t>> {
        let mut cursor = e;
        for _ in 0..WHNF_FUEL {
            let (f, args) = cursor.unfold_apps(self.ctx);

            if let Some(inner) = f.transparent_inner(self.ctx) {
                cursor = inner.fold_apps(args.as_slice(), self.ctx);
                continue
            }

            if f.is_lambda(self.ctx) && !args.is_empty() {
                let mut hd = f;
                let mut consumed = 0usize;
                while consumed < args.len() {
                    match self.ctx.read_expr(hd) {
                        Lambda { body, .. } => {
                            hd = body.inst1(args[consumed], self.ctx);
                            consumed += 1;
                        }
                        _ => break,
                    }
                }
                cursor = hd.fold_apps(&args[consumed..], self.ctx);
                continue
            }

            if let Const { name, levels, .. } = self.ctx.read_expr(f) {
                if let Some(d) = self.ctx.env.get_declar(name).copied() {
                    if let Some(val) = d.unfoldable_val() {
                        let val: ExprPtr<'t> = val;
                        let uparams: LevelsPtr<'t> = d.uparams();
                        let val = val.subst_level_params(uparams, levels, self.ctx);
                        cursor = val.fold_apps(args.as_slice(), self.ctx);
                        continue
                    }
                }
            }

            return Ok(cursor)
        }
        Err(TcErr::OutOfFuel)
    }

    pub fn ensure_pi(&mut self, t: ExprPtr<'t>) -> TcResult<ExprPtr<'t>> {
        if t.is_pi(self.ctx) {
            return Ok(t)
        }
        let whnfd = self.whnf(t)?;
        if whnfd.is_pi(self.ctx) {
            Ok(whnfd)
        } else {
            Err(TcErr::NotAPi)
        }
    }

    /// Whether `e` is a proposition. Always `false` in a predicative
    /// environment.
    pub fn is_prop(&mut self, e: ExprPtr<'t>) -> TcResult<bool> {
        if !self.ctx.env.impredicative() {
            return Ok(false)
        }
        let infd = self.infer(e)?;
        let whnfd = self.whnf(infd)?;
        match self.ctx.read_expr(whnfd) {
            Sort { level, .. } => {
                let simplified = level.simplify(self.ctx);
                Ok(simplified == self.ctx.zero())
            }
            _ => Ok(false),
        }
    }
}

/// The piece of a pi type's shape the printer reads off an inferred head
/// type: the binder style at each argument position.
impl<'x, 't, 'p: 't> TypeChecker<'x, 't, 'p> {
    /// Instantiate the domain of `pi_type` with a fresh local and return
    /// (binder style, next type). Used to walk a head's telescope.
    pub fn telescope_step(&mut self, pi_type: ExprPtr<'t>) -> TcResult<(crate::expr::BinderStyle, ExprPtr<'t>)> {
        match self.ctx.read_expr(pi_type) {
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let internal = internal_name(self.ctx);
                let local = <ExprPtr>::new_local(internal, binder_name, binder_style, binder_type, self.ctx);
                let instd = body.inst1(local, self.ctx);
                let next = self.whnf(instd)?;
                Ok((binder_style, next))
            }
            _ => Err(TcErr::NotAPi),
        }
    }
}
