//! trre pattern language.
//!
//! A pattern describes a relation between input and output strings. Plain
//! regex constructs match input and echo it; the `:` operator consumes its
//! left side and produces its right side instead.
//!
//! # Pattern syntax
//!
//! | Token        | Meaning                                            |
//! |--------------|----------------------------------------------------|
//! | `c`          | Match `c` and echo it                              |
//! | `\c`         | Escaped `c` (`\n \t \r \f \v \0` are controls)     |
//! | `.`          | Any byte, echoed                                   |
//! | `XY`         | Concatenation                                      |
//! | `X\|Y`       | Alternation, left preferred                        |
//! | `X:Y`        | Consume `X`, produce `Y`; `(cat):(dog)` for words  |
//! | `:Y`, `X:`   | Insert `Y`, delete `X`                             |
//! | `X*`         | Zero or more                                       |
//! | `X+`         | One or more                                        |
//! | `X?`         | Zero or one                                        |
//! | `X{n}`       | Exactly n                                          |
//! | `X{n,}`      | At least n                                         |
//! | `X{n,m}`     | Between n and m                                    |
//! | `X{,m}`      | At most m                                          |
//! | `X*?`, `X{n,m}?` | Lazy forms (also `+?` and `??`)                |
//! | `(…)`        | Grouping                                           |
//! | `[abc]`      | Any of the listed characters                       |
//! | `[a-z]`      | Character range                                    |
//! | `[a:x]`      | Pair inside a class                                |
//! | `[a:A-z:Z]`  | Linked range, `a..z` mapped to `A..Z` in lockstep  |
//!
//! Precedence, tightest first: escapes, quantifiers, `:`, concatenation and
//! `-`, `|`.

pub mod ast;
pub mod parser;

pub use ast::Ast;
pub use parser::{SyntaxError, parse};
