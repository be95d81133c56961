//! Property tests: the front end reports errors instead of panicking.

use patito_compiler::compile_source;
use patito_compiler::lexer::Lexer;
use patito_syntax::segment::MemoryLayout;
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "program", "p", ";", "var", "x", ":", "int", "float", "bool", "void", "main", "end",
    "{", "}", "(", ")", "=", "+", "-", "*", "/", "%", "<", ">=", "==", "!=", "if", "else",
    "while", "do", "print", "return", "1", "2.5", "\"s\"", "true", "false", ",", "f",
];

proptest! {
    #[test]
    fn lexer_never_panics(src in "\\PC{0,200}") {
        let _ = Lexer::new(&src).collect_tokens();
    }

    #[test]
    fn compiler_never_panics_on_token_soup(
        picks in proptest::collection::vec(0..FRAGMENTS.len(), 0..60)
    ) {
        let src: Vec<&str> = picks.iter().map(|&i| FRAGMENTS[i]).collect();
        let _ = compile_source(&src.join(" "), MemoryLayout::default());
    }

    #[test]
    fn integer_literals_print_back(n in 0i64..1_000_000) {
        let src = format!("program p; main {{ print({}); }} end", n);
        let program = compile_source(&src, MemoryLayout::default()).unwrap();
        let mut vm = patito_vm::VirtualMachine::new(&program, Vec::new()).unwrap();
        vm.run().unwrap();
        prop_assert_eq!(String::from_utf8(vm.into_output()).unwrap(), format!("{}\n", n));
    }
}
