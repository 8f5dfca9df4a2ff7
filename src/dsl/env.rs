//! Lexically nested scope of variables and user-function signatures.

use std::collections::HashMap;

use super::ast::{FuncParam, ScopeKind};
use super::types::Type;

/// A resolved variable binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Type,
    pub scope: ScopeKind,
}

/// Callable shape of a user function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<FuncParam>,
}

#[derive(Debug, Default)]
struct Frame {
    variables: HashMap<String, Binding>,
    functions: HashMap<String, Signature>,
}

/// Stack of frames, innermost last. The root frame is never popped.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.variables.get(name))
    }

    pub fn define(&mut self, name: impl Into<String>, ty: Type, scope: ScopeKind) {
        if let Some(frame) = self.frames.last_mut() {
            frame.variables.insert(name.into(), Binding { ty, scope });
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Signature> {
        self.frames.iter().rev().find_map(|f| f.functions.get(name))
    }

    pub fn define_function(&mut self, signature: Signature) {
        if let Some(frame) = self.frames.last_mut() {
            frame.functions.insert(signature.name.clone(), signature);
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}
