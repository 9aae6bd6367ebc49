use std::fmt;

/// A kiloc value type. Types are only ever compared for equality; there is no
/// subtyping and no implicit conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
    Void,
}

impl Type {
    /// The keyword used to write the type in source. `Void` has none.
    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::String => "string",
            Type::Void => "void",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
