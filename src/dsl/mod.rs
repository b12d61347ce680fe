//! Netlist text format.
//!
//! A SPICE-flavoured, line-oriented description of a circuit plus the
//! transient analysis to run on it.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line } [ ".end" ]
//! line        = comment | directive | element | coupling | empty
//! comment     = '*' { any_char }          (first column only)
//!             | ('#' | ';') { any_char }
//! element     = name node node { value | keyword | key '=' value | func }
//! coupling    = 'K' name inductor inductor value
//! func        = identifier '(' { value } ')'
//!
//! node        = identifier | number       ("0" and "gnd" are ground)
//! value       = number [scale] [unit]
//! scale       = 'f' | 'p' | 'n' | 'u' | 'µ' | 'm' | 'k' | 'meg' | 'M' | 'G' | 'T'
//! ```
//!
//! # Elements
//!
//! The first letter of the name selects the type.
//!
//! | Type | Syntax |
//! |------|--------|
//! | Resistor | `R<name> <a> <b> <ohms>` |
//! | Capacitor | `C<name> <a> <b> <farads> [ic=<volts>]` |
//! | Inductor | `L<name> <a> <b> <henries> [ic=<amps>]` |
//! | Voltage source | `V<name> <+> <-> [DC] <volts>` or `SIN(<offset> <ampl> <freq> [<phase°>])` |
//! | Current source | `I<name> <a> <b> [DC] <amps>` or `SIN(...)`, flowing from a to b through the source |
//! | Switch | `S<name> <a> <b> on\|off [ron=<ohms>] [roff=<ohms>]` |
//! | Diode | `D<name> <anode> <cathode> [ron=<ohms>] [roff=<ohms>] [vf=<volts>]` |
//! | Thyristor | `T<name> <anode> <cathode> [on\|off] [ton=<s>] [toff=<s>] [trr=<s>] [ron=] [roff=] [vf=]` |
//! | IGBT | `Z<name> <collector> <emitter> [on\|off] [ton=<s>] [toff=<s>] [ron=] [roff=] [vf=]` |
//! | MOSFET | `M<name> <drain> <source> [on\|off] [ton=<s>] [toff=<s>] [ron=] [roff=]` |
//! | Coupling | `K<name> <inductor> <inductor> <k>` |
//!
//! The gate of T, Z and M elements is enabled unless `off` is given, and
//! drives the device for `ton <= t < toff` (default: always).
//!
//! # Directives
//!
//! | Directive | Syntax |
//! |-----------|--------|
//! | .tran | `.tran <step> <stop> [0]` |
//! | .method | `.method be\|trap` |
//! | .print | `.print [tran] v(<net>) i(<element>) ...` |
//! | .options | `.options maxswitch=<n> record=<n>` |
//! | .title | `.title <text>` |
//! | .end | `.end` |
//!
//! # Example
//!
//! ```text
//! * RC charging
//! V1 in  0   DC 10
//! R1 in  out 1k
//! C1 out 0   1u
//! .tran 10u 5m
//! .print v(out) i(C1)
//! .end
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::circuit::Netlist;
use crate::error::Result;

/// Parse netlist text into a syntax tree.
pub fn parse(input: &str) -> Result<NetlistAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse netlist text straight into a [`Netlist`].
pub fn parse_netlist(input: &str) -> Result<Netlist> {
    Netlist::from_ast(&parse(input)?)
}

/// Parse a netlist file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<NetlistAst> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::TransimError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content)
}
