//! The context walker: a backtracking cursor over the atom tree.
//!
//! The walker's context is a zipper: a focus (the atoms still ahead at the
//! current level) plus a stack of parent frames (the right siblings of each
//! enclosing container). Both are cheap slices into the immutable tree, so
//! snapshotting for backtracking is a couple of pointer copies plus a clone
//! of the threaded user state.
//!
//! Backtracking is pure: [`Cursor::attempt`] restores both the context and
//! the [`Meta`] state when the tried parser fails, so a failing alternative
//! leaves no trace.

use crate::atom::{Arg, Atom, MathKind};
use crate::doc::meta::Meta;

/// Why a parser failed. These are expected backtracking signals; they only
/// surface when no alternative succeeds at a top-level production.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The focus is exhausted.
    EndOfGroup,
    /// The next atom is not what the parser wanted.
    Unexpected(String),
    /// A parser-supplied message.
    Message(String),
}

impl Failure {
    pub fn unexpected(atom: &Atom) -> Failure {
        Failure::Unexpected(match atom {
            Atom::Plain(s) => format!["text `{s}`"],
            Atom::Command(name, _) => format!["command \\{name}"],
            Atom::Group(name, _, _) if name.is_empty() => "group".into(),
            Atom::Group(name, _, _) => format!["environment `{name}`"],
            Atom::Math(_, _) => "math".into(),
            Atom::SupScript(_) => "superscript".into(),
            Atom::SubScript(_) => "subscript".into(),
            Atom::AlignMark => "alignment mark".into(),
            Atom::White => "whitespace".into(),
            Atom::Newline => "line break".into(),
            Atom::Par => "paragraph break".into(),
        })
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::EndOfGroup => write!(f, "end of group"),
            Failure::Unexpected(what) => write!(f, "unexpected {what}"),
            Failure::Message(msg) => write!(f, "{msg}"),
        }
    }
}

pub type PResult<T> = Result<T, Failure>;

#[derive(Clone)]
struct Frame<'a> {
    rest: &'a [Atom],
}

#[derive(Clone)]
struct Context<'a> {
    focus: &'a [Atom],
    parents: Vec<Frame<'a>>,
}

/// The walking cursor: context plus threaded user state.
pub struct Cursor<'a> {
    ctx: Context<'a>,
    pub meta: Meta,
}

impl<'a> Cursor<'a> {
    pub fn new(atoms: &'a [Atom], meta: Meta) -> Cursor<'a> {
        Cursor {
            ctx: Context {
                focus: atoms,
                parents: Vec::new(),
            },
            meta,
        }
    }

    pub fn into_meta(self) -> Meta {
        self.meta
    }

    /// Consume one atom from the focus.
    pub fn item(&mut self) -> PResult<&'a Atom> {
        match self.ctx.focus.split_first() {
            Some((head, rest)) => {
                self.ctx.focus = rest;
                Ok(head)
            }
            None => Err(Failure::EndOfGroup),
        }
    }

    /// The next atom without consuming it.
    pub fn peek(&self) -> Option<&'a Atom> {
        self.ctx.focus.first()
    }

    /// Consume the next atom if the predicate accepts it.
    pub fn satisfy(&mut self, pred: impl Fn(&Atom) -> bool) -> PResult<&'a Atom> {
        match self.peek() {
            None => Err(Failure::EndOfGroup),
            Some(atom) if pred(atom) => self.item(),
            Some(atom) => Err(Failure::unexpected(atom)),
        }
    }

    /// Succeed only when the focus is exhausted at the current level.
    pub fn eog(&self) -> PResult<()> {
        if self.ctx.focus.is_empty() {
            Ok(())
        } else {
            Err(Failure::unexpected(self.ctx.focus.first().unwrap()))
        }
    }

    /// Succeed only at the very end of the tree.
    pub fn eof(&self) -> PResult<()> {
        if self.ctx.focus.is_empty() && self.ctx.parents.iter().all(|f| f.rest.is_empty()) {
            Ok(())
        } else {
            Err(Failure::Message("input remains".into()))
        }
    }

    /// Descend into the body of the container at the head of the focus.
    pub fn go_down(&mut self) -> PResult<()> {
        let (head, rest) = match self.ctx.focus.split_first() {
            None => return Err(Failure::EndOfGroup),
            Some(split) => split,
        };
        let body: &'a [Atom] = match head {
            Atom::Group(_, _, body) => body,
            Atom::Math(_, body) => body,
            Atom::SupScript(body) => body,
            Atom::SubScript(body) => body,
            Atom::Command(_, args) => match args.iter().find_map(|arg| match arg {
                Arg::Required(body) => Some(body.as_slice()),
                _ => None,
            }) {
                Some(body) => body,
                None => return Err(Failure::unexpected(head)),
            },
            other => return Err(Failure::unexpected(other)),
        };
        self.ctx.parents.push(Frame { rest });
        self.ctx.focus = body;
        Ok(())
    }

    /// Return to the parent level, discarding whatever remains of the
    /// current focus.
    pub fn go_up(&mut self) -> PResult<()> {
        match self.ctx.parents.pop() {
            None => Err(Failure::Message("already at the top level".into())),
            Some(frame) => {
                self.ctx.focus = frame.rest;
                Ok(())
            }
        }
    }

    /// Like [`go_up`](Cursor::go_up) but requires the current level to be
    /// exhausted.
    pub fn safe_up(&mut self) -> PResult<()> {
        self.eog()?;
        self.go_up()
    }

    /// Run a parser, restoring context and user state on failure.
    pub fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let ctx = self.ctx.clone();
        let meta = self.meta.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(failure) => {
                self.ctx = ctx;
                self.meta = meta;
                Err(failure)
            }
        }
    }

    /// The first alternative that succeeds.
    pub fn choice<T>(&mut self, alts: &[&dyn Fn(&mut Self) -> PResult<T>]) -> PResult<T> {
        let mut last = Failure::Message("no alternative given".into());
        for alt in alts {
            match self.attempt(alt) {
                Ok(value) => return Ok(value),
                Err(failure) => last = failure,
            }
        }
        Err(last)
    }

    /// An opaque marker that changes whenever input is consumed; used by
    /// repetition guards to detect a parser that succeeds without
    /// progressing.
    pub fn progress(&self) -> (usize, usize) {
        (self.ctx.focus.len(), self.ctx.parents.len())
    }

    /// Zero or more repetitions. Stops when the parser fails or stops
    /// consuming input.
    pub fn many<T>(&mut self, mut f: impl FnMut(&mut Self) -> PResult<T>) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            let before = self.progress();
            match self.attempt(&mut f) {
                Err(_) => return out,
                Ok(value) => {
                    out.push(value);
                    if self.progress() == before {
                        return out;
                    }
                }
            }
        }
    }

    /// Exactly `n` repetitions.
    pub fn count<T>(&mut self, n: usize, mut f: impl FnMut(&mut Self) -> PResult<T>) -> PResult<Vec<T>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(f(self)?);
        }
        Ok(out)
    }

    /// `p (sep p)*`, possibly empty.
    pub fn sep_by<T, S>(
        &mut self,
        mut p: impl FnMut(&mut Self) -> PResult<T>,
        mut sep: impl FnMut(&mut Self) -> PResult<S>,
    ) -> Vec<T> {
        let mut out = Vec::new();
        match self.attempt(&mut p) {
            Err(_) => return out,
            Ok(first) => out.push(first),
        }
        loop {
            let step = self.attempt(|cur| {
                sep(cur)?;
                p(cur)
            });
            match step {
                Ok(value) => out.push(value),
                Err(_) => return out,
            }
        }
    }

    /// Like [`sep_by`](Cursor::sep_by) but tolerates a trailing separator.
    pub fn sep_end_by<T, S>(
        &mut self,
        p: impl FnMut(&mut Self) -> PResult<T>,
        mut sep: impl FnMut(&mut Self) -> PResult<S>,
    ) -> Vec<T> {
        let out = self.sep_by(p, &mut sep);
        let _ = self.attempt(&mut sep);
        out
    }

    /// A bulleted sequence: each item starts with `bullet` and runs `p`
    /// until the next bullet or the end of the group.
    pub fn list<B, T>(
        &mut self,
        mut bullet: impl FnMut(&mut Self) -> PResult<B>,
        mut p: impl FnMut(&mut Self) -> PResult<T>,
    ) -> Vec<T> {
        self.many(|cur| {
            bullet(cur)?;
            p(cur)
        })
    }

    /// Try at the current level; on failure descend into the first
    /// container and retry, recursively.
    pub fn opt_nested<T>(&mut self, f: &dyn Fn(&mut Self) -> PResult<T>) -> PResult<T> {
        match self.attempt(f) {
            Ok(value) => Ok(value),
            Err(failure) => {
                let nested = self.attempt(|cur| {
                    cur.go_down()?;
                    let value = cur.opt_nested(f)?;
                    cur.go_up()?;
                    Ok(value)
                });
                nested.map_err(|_| failure)
            }
        }
    }

    // -----------------------------------------------------------------
    // Command and group helpers
    // -----------------------------------------------------------------

    /// Consume a command atom by name, yielding its arguments.
    pub fn command(&mut self, name: &str) -> PResult<&'a [Arg]> {
        match self.peek() {
            Some(Atom::Command(n, args)) if n == name => {
                self.item()?;
                Ok(args)
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }

    // Run a parser over a detached atom slice, threading the user state
    // through. The sub-parser must exhaust the slice.
    pub fn within<T>(
        &mut self,
        atoms: &'a [Atom],
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let meta = std::mem::take(&mut self.meta);
        let mut sub = Cursor::new(atoms, meta);
        let result = f(&mut sub);
        self.meta = sub.into_meta();
        result
    }

    /// Parse a command with one mandatory argument, running `f` over it.
    pub fn in_cmd<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let args = self.command(name)?;
        let body = Atom::required_arg(args, 0)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its argument"]))?;
        self.within(body, f)
    }

    /// Parse a command with two mandatory arguments.
    pub fn in_cmd2<T, U>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
        g: impl FnOnce(&mut Self) -> PResult<U>,
    ) -> PResult<(T, U)> {
        let args = self.command(name)?;
        let first = Atom::required_arg(args, 0)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its first argument"]))?;
        let second = Atom::required_arg(args, 1)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its second argument"]))?;
        let t = self.within(first, f)?;
        let u = self.within(second, g)?;
        Ok((t, u))
    }

    /// Parse a command with three mandatory arguments.
    pub fn in_cmd3<T, U, V>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
        g: impl FnOnce(&mut Self) -> PResult<U>,
        h: impl FnOnce(&mut Self) -> PResult<V>,
    ) -> PResult<(T, U, V)> {
        let args = self.command(name)?;
        let first = Atom::required_arg(args, 0)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its first argument"]))?;
        let second = Atom::required_arg(args, 1)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its second argument"]))?;
        let third = Atom::required_arg(args, 2)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its third argument"]))?;
        let t = self.within(first, f)?;
        let u = self.within(second, g)?;
        let v = self.within(third, h)?;
        Ok((t, u, v))
    }

    /// Parse a command, running `f` over its mandatory argument and
    /// returning the optional argument bodies alongside.
    pub fn in_cmd_with_opts<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(Vec<&'a [Atom]>, T)> {
        let args = self.command(name)?;
        let opts: Vec<&'a [Atom]> = args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Optional(body) => Some(body.as_slice()),
                _ => None,
            })
            .collect();
        let body = Atom::required_arg(args, 0)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its argument"]))?;
        let value = self.within(body, f)?;
        Ok((opts, value))
    }

    /// Parse the first two optional arguments of a command, then run `f`
    /// over its mandatory argument.
    pub fn in_cmd_opt2<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(Option<&'a [Atom]>, Option<&'a [Atom]>, T)> {
        let (opts, value) = self.in_cmd_with_opts(name, f)?;
        let mut opts = opts.into_iter();
        Ok((opts.next(), opts.next(), value))
    }

    /// Parse a command, reporting whether it carries a star.
    pub fn in_cmd_check_star<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(bool, T)> {
        let args = self.command(name)?;
        let starred = Atom::has_star(args);
        let body = Atom::required_arg(args, 0)
            .ok_or_else(|| Failure::Message(format!["\\{name} is missing its argument"]))?;
        let value = self.within(body, f)?;
        Ok((starred, value))
    }

    /// Parse a named group, running `f` over its body.
    pub fn in_grp<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        match self.peek() {
            Some(Atom::Group(n, _, body)) if n == name => {
                self.item()?;
                self.within(body, f)
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }

    /// Parse any of several named groups; yields the matched name too.
    pub fn in_grp_choice<T>(
        &mut self,
        names: &[&str],
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(&'a str, T)> {
        match self.peek() {
            Some(Atom::Group(n, _, body)) if names.contains(&n.as_str()) => {
                self.item()?;
                let value = self.within(body, f)?;
                Ok((n.as_str(), value))
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }

    /// Parse a math group, yielding its kind.
    pub fn in_math_grp<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<(MathKind, T)> {
        match self.peek() {
            Some(Atom::Math(kind, body)) => {
                let kind = *kind;
                self.item()?;
                let value = self.within(body, f)?;
                Ok((kind, value))
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }

    pub fn in_sup_script<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        match self.peek() {
            Some(Atom::SupScript(body)) => {
                self.item()?;
                self.within(body, f)
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }

    pub fn in_sub_script<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        match self.peek() {
            Some(Atom::SubScript(body)) => {
                self.item()?;
                self.within(body, f)
            }
            Some(atom) => Err(Failure::unexpected(atom)),
            None => Err(Failure::EndOfGroup),
        }
    }
}
