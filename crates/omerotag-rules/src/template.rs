//! Positional brace templates for name-rule output: `{}`, `{0}`, `{{` and `}}`.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(usize),
}

#[derive(Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl FormatTemplate {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut auto_index = 0usize;
        let mut numbering: Option<bool> = None; // Some(true) = automatic, Some(false) = explicit
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(format!("unbalanced '{{' in format {:?}", source))
                            }
                            Some(ch) => field.push(ch),
                        }
                    }
                    let index = if field.is_empty() {
                        if numbering == Some(false) {
                            return Err(format!(
                                "format {:?} mixes automatic and explicit field numbering",
                                source
                            ));
                        }
                        numbering = Some(true);
                        auto_index += 1;
                        auto_index - 1
                    } else if let Ok(n) = field.parse::<usize>() {
                        if numbering == Some(true) {
                            return Err(format!(
                                "format {:?} mixes automatic and explicit field numbering",
                                source
                            ));
                        }
                        numbering = Some(false);
                        n
                    } else {
                        return Err(format!(
                            "unsupported field {{{}}} in format {:?}; only positional fields are allowed",
                            field, source
                        ));
                    };
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Field(index));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(format!("single '}}' in format {:?}", source)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of positional arguments the template reads (highest index + 1).
    pub fn arity(&self) -> usize {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Field(i) => Some(i + 1),
                Piece::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Substitute positional arguments. Extra arguments are ignored.
    pub fn render(&self, args: &[&str]) -> Result<String, String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Field(i) => match args.get(*i) {
                    Some(arg) => out.push_str(arg),
                    None => {
                        return Err(format!(
                            "format {:?} reads argument {} but only {} given",
                            self.source,
                            i,
                            args.len()
                        ))
                    }
                },
            }
        }
        Ok(out)
    }

    /// Dry substitution with `count` placeholder arguments.
    pub fn check(&self, count: usize) -> Result<(), String> {
        let placeholders = vec![""; count];
        self.render(&placeholders).map(|_| ())
    }
}

impl fmt::Debug for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormatTemplate({:?})", self.source)
    }
}

impl fmt::Display for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
