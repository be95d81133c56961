//! Semantic cube: result types of binary operators and assignment compatibility.

use crate::error::SemanticError;
use patito_syntax::ast::{BinOp, Type};

use BinOp::*;
use Type::{Bool, Float, Int};

/// (operator, left, right) -> result. Pairs not listed are incompatible.
const CUBE: &[(BinOp, Type, Type, Type)] = &[
    (Add, Int, Int, Int),
    (Add, Int, Float, Float),
    (Add, Float, Int, Float),
    (Add, Float, Float, Float),
    (Sub, Int, Int, Int),
    (Sub, Int, Float, Float),
    (Sub, Float, Int, Float),
    (Sub, Float, Float, Float),
    (Mul, Int, Int, Int),
    (Mul, Int, Float, Float),
    (Mul, Float, Int, Float),
    (Mul, Float, Float, Float),
    (Div, Int, Int, Float),
    (Div, Int, Float, Float),
    (Div, Float, Int, Float),
    (Div, Float, Float, Float),
    (Rem, Int, Int, Int),
    (Gt, Int, Int, Bool),
    (Gt, Int, Float, Bool),
    (Gt, Float, Int, Bool),
    (Gt, Float, Float, Bool),
    (Lt, Int, Int, Bool),
    (Lt, Int, Float, Bool),
    (Lt, Float, Int, Bool),
    (Lt, Float, Float, Bool),
    (Ge, Int, Int, Bool),
    (Ge, Int, Float, Bool),
    (Ge, Float, Int, Bool),
    (Ge, Float, Float, Bool),
    (Le, Int, Int, Bool),
    (Le, Int, Float, Bool),
    (Le, Float, Int, Bool),
    (Le, Float, Float, Bool),
    (Eq, Int, Int, Bool),
    (Eq, Int, Float, Bool),
    (Eq, Float, Int, Bool),
    (Eq, Float, Float, Bool),
    (Eq, Bool, Bool, Bool),
    (Ne, Int, Int, Bool),
    (Ne, Int, Float, Bool),
    (Ne, Float, Int, Bool),
    (Ne, Float, Float, Bool),
    (Ne, Bool, Bool, Bool),
];

pub fn check_binary_op(op: BinOp, left: Type, right: Type) -> Result<Type, SemanticError> {
    CUBE.iter()
        .find(|(o, l, r, _)| *o == op && *l == left && *r == right)
        .map(|&(_, _, _, result)| result)
        .ok_or_else(|| SemanticError::IncompatibleTypes {
            op: op.symbol().to_string(),
            left,
            right,
        })
}

/// An int value may widen into a float target; every other pair must match.
pub fn check_assignment(target: &str, target_ty: Type, value_ty: Type) -> Result<(), SemanticError> {
    if target_ty == value_ty || (target_ty == Float && value_ty == Int) {
        Ok(())
    } else {
        Err(SemanticError::IncompatibleAssignment {
            target: target.to_string(),
            expected: target_ty,
            found: value_ty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes_to_float() {
        assert_eq!(check_binary_op(Add, Int, Int), Ok(Int));
        assert_eq!(check_binary_op(Mul, Int, Float), Ok(Float));
        assert_eq!(check_binary_op(Sub, Float, Int), Ok(Float));
    }

    #[test]
    fn division_is_always_float() {
        assert_eq!(check_binary_op(Div, Int, Int), Ok(Float));
        assert_eq!(check_binary_op(Div, Float, Float), Ok(Float));
    }

    #[test]
    fn remainder_only_on_ints() {
        assert_eq!(check_binary_op(Rem, Int, Int), Ok(Int));
        assert!(check_binary_op(Rem, Float, Int).is_err());
    }

    #[test]
    fn comparisons_yield_bool() {
        assert_eq!(check_binary_op(Lt, Int, Float), Ok(Bool));
        assert_eq!(check_binary_op(Eq, Bool, Bool), Ok(Bool));
        assert!(check_binary_op(Lt, Bool, Bool).is_err());
    }

    #[test]
    fn strings_and_bools_reject_arithmetic() {
        let err = check_binary_op(Add, Bool, Int).unwrap_err();
        assert_eq!(err.to_string(), "incompatible types: bool + int");
        assert!(check_binary_op(Add, Type::String, Type::String).is_err());
        assert!(check_binary_op(Eq, Type::String, Type::String).is_err());
    }

    #[test]
    fn assignment_widens_int_only() {
        assert!(check_assignment("x", Float, Int).is_ok());
        assert!(check_assignment("x", Int, Int).is_ok());
        assert!(matches!(
            check_assignment("x", Int, Float),
            Err(SemanticError::IncompatibleAssignment { .. })
        ));
        assert!(check_assignment("b", Bool, Int).is_err());
    }
}
