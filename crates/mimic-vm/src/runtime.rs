use mimic_value::{Document, Value};
use mlua::{Function, Lua, Table};

use crate::convert::from_lua;
use crate::error::ScriptError;
use crate::literal::{document_literal, string_literal, value_literal};

const PRELUDE: &str = include_str!("prelude.lua");

/// One Lua state with the document prelude installed.
///
/// Globals written by one unit are visible to every later unit run in the
/// same scope, which is how map, reduce and finalize share their state.
/// Separate scopes share nothing.
pub struct ScriptScope {
    lua: Lua,
}

impl ScriptScope {
    pub fn new() -> Result<Self, ScriptError> {
        let lua = Lua::new();
        lua.load(PRELUDE)
            .set_name("prelude")
            .exec()
            .map_err(|e| ScriptError::new("prelude", PRELUDE, e))?;
        Ok(Self { lua })
    }

    /// Check that `source` compiles as an expression or a chunk, without
    /// running it.
    pub fn check_syntax(name: &str, source: &str) -> Result<(), ScriptError> {
        let lua = Lua::new();
        load_expression_or_chunk(&lua, name, source, None)
            .map(|_| ())
            .map_err(|e| ScriptError::new(name, source, e))
    }

    /// Run a chunk at global scope.
    pub fn exec(&self, name: &str, source: &str) -> Result<(), ScriptError> {
        tracing::trace!(unit = name, chars = source.len(), "executing script unit");
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(|e| ScriptError::new(name, source, e))
    }

    /// Compile `source`, which must evaluate to a function, and store it in
    /// the global `global`.
    ///
    /// When called through `__with_document(doc, fn)` the function sees
    /// `doc` as `this` and resolves bare names against its fields before
    /// falling back to globals.
    pub fn bind(&self, global: &str, name: &str, source: &str) -> Result<(), ScriptError> {
        let fail = |e| ScriptError::new(name, source, e);
        let env = self.bindings().map_err(fail)?;
        let value: mlua::Value = self
            .lua
            .load(format!("return {source}"))
            .set_name(name)
            .set_environment(env)
            .eval()
            .map_err(fail)?;
        let mlua::Value::Function(function) = value else {
            return Err(ScriptError::new(
                name,
                source,
                format!("expected a function, got a Lua {}", value.type_name()),
            ));
        };
        self.lua.globals().set(global, function).map_err(fail)
    }

    /// Evaluate a predicate against `doc`.
    ///
    /// `source` may be an expression, a chunk ending in `return`, or a
    /// function; a function result is called with the same document bound.
    /// `nil`, `false` and `null` are false, any other result is true.
    pub fn eval_predicate(&self, name: &str, source: &str, doc: &Document) -> Result<bool, ScriptError> {
        self.run_predicate(name, source, doc)
            .map_err(|e| ScriptError::new(name, source, e))
    }

    fn run_predicate(&self, name: &str, source: &str, doc: &Document) -> mlua::Result<bool> {
        let env = self.bindings()?;
        let chunk = load_expression_or_chunk(&self.lua, name, source, Some(env))?;
        let this: mlua::Value = self
            .lua
            .load(format!("return {}", document_literal(doc)))
            .set_name("document")
            .eval()?;
        let with_document: Function = self.lua.globals().get("__with_document")?;

        let mut result: mlua::Value = with_document.call((this.clone(), chunk))?;
        if let mlua::Value::Function(function) = result {
            result = with_document.call((this, function))?;
        }
        is_truthy(&result)
    }

    /// Store `value` in the global `name`.
    pub fn set_global(&self, name: &str, value: &Value) -> Result<(), ScriptError> {
        let source = format!("_G[{}] = {}", string_literal(name), value_literal(value));
        self.exec(name, &source)
    }

    /// Read the global `name` back as a value; unset globals read as null.
    pub fn global(&self, name: &str) -> Result<Value, ScriptError> {
        let value: mlua::Value = self
            .lua
            .globals()
            .get(name)
            .map_err(|e| ScriptError::new(name, "", e))?;
        from_lua(&value).map_err(|e| ScriptError::new(name, "", e))
    }

    fn bindings(&self) -> mlua::Result<Table> {
        self.lua.globals().get("__bindings")
    }
}

/// Prefer the expression form so `this.a > 1` needs no `return`.
fn load_expression_or_chunk(
    lua: &Lua,
    name: &str,
    source: &str,
    env: Option<Table>,
) -> mlua::Result<Function> {
    let load = |text: String| {
        let chunk = lua.load(text).set_name(name);
        match env.clone() {
            Some(env) => chunk.set_environment(env).into_function(),
            None => chunk.into_function(),
        }
    };
    load(format!("return {source}")).or_else(|_| load(source.to_string()))
}

fn is_truthy(value: &mlua::Value) -> mlua::Result<bool> {
    Ok(match value {
        mlua::Value::Nil => false,
        mlua::Value::Boolean(b) => *b,
        mlua::Value::Table(table) => match table.metatable() {
            Some(meta) => meta.raw_get::<Option<String>>("__name")?.as_deref() != Some("null"),
            None => true,
        },
        _ => true,
    })
}
