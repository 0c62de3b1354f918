//! The operator precedence table, carried over verbatim (in meaning) from
//! `original_source/Exp.c`'s `OperatorPrecedence[]`: prefix/infix/postfix
//! precedence per operator, with levels 2 (assignment) and 14 (unary
//! prefix) right-associative and everything else left-associative.

use cembed_lexer::Punct;

pub const BRACKET_PRECEDENCE: u32 = 20;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OpPrecedence {
    pub prefix: u32,
    pub infix: u32,
    pub postfix: u32,
}

const NONE: u32 = 0;

pub fn precedence_of(p: Punct) -> OpPrecedence {
    use Punct::*;
    match p {
        Comma => OpPrecedence { prefix: NONE, infix: NONE, postfix: NONE },
        Assign | AddAssign | SubAssign | MulAssign | DivAssign | ModAssign | ShlAssign | ShrAssign
        | AndAssign | OrAssign | XorAssign => OpPrecedence { prefix: NONE, infix: 2, postfix: NONE },
        Question | Colon => OpPrecedence { prefix: NONE, infix: 3, postfix: NONE },
        OrOr => OpPrecedence { prefix: NONE, infix: 4, postfix: NONE },
        AndAnd => OpPrecedence { prefix: NONE, infix: 5, postfix: NONE },
        Or => OpPrecedence { prefix: NONE, infix: 6, postfix: NONE },
        Xor => OpPrecedence { prefix: NONE, infix: 7, postfix: NONE },
        Amp => OpPrecedence { prefix: 14, infix: 8, postfix: NONE },
        Eq | Ne => OpPrecedence { prefix: NONE, infix: 9, postfix: NONE },
        Lt | Gt | Le | Ge => OpPrecedence { prefix: NONE, infix: 10, postfix: NONE },
        Shl | Shr => OpPrecedence { prefix: NONE, infix: 11, postfix: NONE },
        Plus | Minus => OpPrecedence { prefix: 14, infix: 12, postfix: NONE },
        Star => OpPrecedence { prefix: 14, infix: 13, postfix: NONE },
        Slash | Percent => OpPrecedence { prefix: NONE, infix: 13, postfix: NONE },
        Incr | Decr => OpPrecedence { prefix: 14, infix: NONE, postfix: 15 },
        Not | Tilde => OpPrecedence { prefix: 14, infix: NONE, postfix: NONE },
        LBracket => OpPrecedence { prefix: NONE, infix: 15, postfix: NONE },
        RBracket => OpPrecedence { prefix: NONE, infix: NONE, postfix: 15 },
        Dot | Arrow => OpPrecedence { prefix: NONE, infix: 15, postfix: NONE },
        LParen => OpPrecedence { prefix: 15, infix: NONE, postfix: NONE },
        RParen => OpPrecedence { prefix: NONE, infix: NONE, postfix: 15 },
        Ellipsis | Semicolon | LBrace | RBrace => OpPrecedence { prefix: NONE, infix: NONE, postfix: NONE },
    }
}

/// "Whether evaluation is left to right for a given precedence level":
/// levels 2 (assignment) and 14 (unary prefix) are right-to-left.
pub fn is_right_to_left(level: u32) -> bool {
    level == 2 || level == 14
}
