//! Parser for the netlist format.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::circuit::Probe;
use crate::error::{Result, TransimError};

/// Recursive-descent parser over a [`Lexer`].
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            peeked: None,
        })
    }

    /// Parse every line up to `.end` or end of input.
    pub fn parse(&mut self) -> Result<NetlistAst> {
        let mut ast = NetlistAst::new();

        loop {
            match self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => {
                    if !self.parse_directive(&mut ast)? {
                        break;
                    }
                }
                TokenKind::Identifier => {
                    let line = self.parse_element()?;
                    if line.prefix() == "K" {
                        ast.couplings.push(coupling_from(line)?);
                    } else {
                        ast.elements.push(line);
                    }
                }
                _ => {
                    return Err(TransimError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(TransimError::parse(
                        self.current.line,
                        format!("unexpected trailing token: {:?}", self.current.text),
                    ));
                }
            }
        }

        log::debug!(
            "parsed {} elements, {} couplings, {} print signals",
            ast.elements.len(),
            ast.couplings.len(),
            ast.prints.len()
        );
        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = match self.peeked.take() {
            Some(tok) => tok,
            None => self.lexer.next_token()?,
        };
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        match &self.peeked {
            Some(tok) => Ok(tok),
            None => Err(TransimError::parse(self.current.line, "unexpected end of input")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(TransimError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn expect_number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| TransimError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// A net or element name. Plain numbers such as `0` or `12` are names too.
    fn expect_name(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(text)
            }
            _ => Err(TransimError::parse(
                self.current.line,
                format!("expected a name, got {:?}", self.current.text),
            )),
        }
    }

    /// Returns `false` on `.end`.
    fn parse_directive(&mut self, ast: &mut NetlistAst) -> Result<bool> {
        let directive = self.current.text.to_lowercase();
        let line = self.current.line;
        self.advance()?;

        match directive.as_str() {
            ".tran" => {
                let step = self.expect_number()?;
                let stop = self.expect_number()?;
                if !self.at_line_end() {
                    // optional start time, not supported beyond t = 0
                    let start = self.expect_number()?;
                    if start != 0.0 {
                        return Err(TransimError::parse(line, "non-zero .tran start time"));
                    }
                }
                ast.tran = Some(TranDirective { step, stop });
            }
            ".method" => {
                let name = self.expect(TokenKind::Identifier)?;
                let method = name
                    .text
                    .parse()
                    .map_err(|_| TransimError::parse(line, format!("unknown method: {}", name.text)))?;
                ast.method = Some(method);
            }
            ".print" | ".probe" => {
                if self.current.kind == TokenKind::Identifier
                    && self.current.text.eq_ignore_ascii_case("tran")
                {
                    self.advance()?;
                }
                while !self.at_line_end() {
                    let probe = self.parse_probe()?;
                    ast.prints.push(probe);
                }
            }
            ".options" | ".option" => {
                while !self.at_line_end() {
                    let key = self.expect(TokenKind::Identifier)?;
                    self.expect(TokenKind::Equals)?;
                    let value = self.expect_number()?;
                    ast.options.insert(key.text.to_lowercase(), value);
                }
            }
            ".title" => {
                while !self.at_line_end() {
                    self.advance()?;
                }
            }
            ".end" => return Ok(false),
            _ => {
                return Err(TransimError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }
        Ok(true)
    }

    /// `v(<net>)` or `i(<element>)`
    fn parse_probe(&mut self) -> Result<Probe> {
        let kind = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::OpenParen)?;
        let target = self.expect_name()?;
        self.expect(TokenKind::CloseParen)?;
        match kind.text.to_lowercase().as_str() {
            "v" => Ok(Probe::Voltage(target)),
            "i" => Ok(Probe::Current(target)),
            _ => Err(TransimError::parse(
                kind.line,
                format!("expected v(...) or i(...), got {}(...)", kind.text),
            )),
        }
    }

    fn parse_element(&mut self) -> Result<ElementLine> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        let line = name_tok.line;
        let node_a = self.expect_name()?;
        let node_b = self.expect_name()?;

        let mut values = Vec::new();
        let mut keywords = Vec::new();
        let mut function = None;
        let mut params = HashMap::new();

        while !self.at_line_end() {
            match self.current.kind {
                TokenKind::Number => {
                    values.push(self.expect_number()?);
                }
                TokenKind::Identifier => {
                    let next = self.peek()?.kind.clone();
                    let ident = self.current.text.clone();
                    self.advance()?;
                    match next {
                        TokenKind::Equals => {
                            self.advance()?;
                            let value = self.expect_number()?;
                            params.insert(ident.to_lowercase(), value);
                        }
                        TokenKind::OpenParen => {
                            self.advance()?;
                            let mut args = Vec::new();
                            while self.current.kind == TokenKind::Number {
                                args.push(self.expect_number()?);
                            }
                            self.expect(TokenKind::CloseParen)?;
                            if function.is_some() {
                                return Err(TransimError::parse(
                                    line,
                                    format!("{} has more than one source function", name_tok.text),
                                ));
                            }
                            function = Some(FunctionCall {
                                name: ident.to_uppercase(),
                                args,
                            });
                        }
                        _ => keywords.push(ident),
                    }
                }
                _ => {
                    return Err(TransimError::parse(
                        self.current.line,
                        format!("unexpected token in {}: {:?}", name_tok.text, self.current.text),
                    ));
                }
            }
        }

        Ok(ElementLine {
            name: name_tok.text,
            node_a,
            node_b,
            values,
            keywords,
            function,
            params,
            line,
        })
    }
}

/// A `K` line reuses the element grammar: two inductor names and a factor.
fn coupling_from(line: ElementLine) -> Result<CouplingLine> {
    match line.values.as_slice() {
        [k] if line.keywords.is_empty() && line.function.is_none() && line.params.is_empty() => {
            Ok(CouplingLine {
                name: line.name,
                first: line.node_a,
                second: line.node_b,
                k: *k,
                line: line.line,
            })
        }
        _ => Err(TransimError::parse(
            line.line,
            format!("{} expects <inductor> <inductor> <k>", line.name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::IntegrationMethod;
    use approx::assert_relative_eq;

    fn parse(input: &str) -> Result<NetlistAst> {
        Parser::new(Lexer::new(input))?.parse()
    }

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 in out 4.7k").unwrap();
        assert_eq!(ast.elements.len(), 1);
        let r = &ast.elements[0];
        assert_eq!(r.name, "R1");
        assert_eq!(r.prefix(), "R");
        assert_eq!((r.node_a.as_str(), r.node_b.as_str()), ("in", "out"));
        assert_relative_eq!(r.values[0], 4700.0);
    }

    #[test]
    fn test_parse_initial_condition() {
        let ast = parse("C1 1 0 1u ic=2.5\n").unwrap();
        let c = &ast.elements[0];
        assert_eq!(c.node_a, "1");
        assert_relative_eq!(c.values[0], 1e-6);
        assert_relative_eq!(c.params["ic"], 2.5);
    }

    #[test]
    fn test_parse_sources() {
        let ast = parse("V1 in 0 DC 5\nV2 a 0 SIN(0 10 50 90)\n").unwrap();
        assert!(ast.elements[0].has_keyword("dc"));
        assert_eq!(ast.elements[0].values, vec![5.0]);
        let f = ast.elements[1].function.as_ref().unwrap();
        assert_eq!(f.name, "SIN");
        assert_eq!(f.args, vec![0.0, 10.0, 50.0, 90.0]);
    }

    #[test]
    fn test_parse_switch_keywords() {
        let ast = parse("S1 a b on ron=10m").unwrap();
        let s = &ast.elements[0];
        assert!(s.has_keyword("on"));
        assert_relative_eq!(s.params["ron"], 0.01);
    }

    #[test]
    fn test_parse_coupling() {
        let ast = parse("L1 a 0 1m\nL2 b 0 1m\nK1 L1 L2 0.99\n").unwrap();
        assert_eq!(ast.elements.len(), 2);
        assert_eq!(ast.couplings.len(), 1);
        let k = &ast.couplings[0];
        assert_eq!((k.first.as_str(), k.second.as_str()), ("L1", "L2"));
        assert_relative_eq!(k.k, 0.99);
    }

    #[test]
    fn test_coupling_needs_factor() {
        let err = parse("K1 L1 L2\n").unwrap_err();
        assert!(matches!(err, TransimError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_parse_directives() {
        let ast = parse(
            "* rc\n.tran 10u 5m\n.method trap\n.print tran v(out) i(R1)\n.options record=10\n",
        )
        .unwrap();
        let tran = ast.tran.unwrap();
        assert_relative_eq!(tran.step, 1e-5);
        assert_relative_eq!(tran.stop, 5e-3);
        assert_eq!(ast.method, Some(IntegrationMethod::Trapezoidal));
        assert_eq!(
            ast.prints,
            vec![Probe::Voltage("out".into()), Probe::Current("R1".into())]
        );
        assert_relative_eq!(ast.options["record"], 10.0);
    }

    #[test]
    fn test_end_stops_parsing() {
        let ast = parse("R1 a 0 1\n.end\nthis is ignored\n").unwrap();
        assert_eq!(ast.elements.len(), 1);
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse("R1 a 0 1\n.model foo\n").unwrap_err();
        assert!(matches!(err, TransimError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_unknown_method() {
        assert!(parse(".method gear\n").is_err());
    }

    #[test]
    fn test_missing_node() {
        let err = parse("R1 a\n").unwrap_err();
        assert!(matches!(err, TransimError::ParseError { line: 1, .. }));
    }
}
