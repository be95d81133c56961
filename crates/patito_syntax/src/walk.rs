//! Ordered pre/post traversal of a Patito program.
//!
//! `walk_program` drives a [`Listener`] through the program in source order: every
//! construct gets its events after (and, where the protocol needs it, before) its
//! children. The scope a construct lives in is an explicit value handed out by
//! `enter_program` / `enter_function` and passed back to every hook, so the
//! listener never has to keep a "current function" field in sync with the walk.

use crate::ast::*;

/// Which construct a condition expression belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionOf {
    If,
    While,
}

/// Whether a call's value is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallSite {
    Statement,
    Expression,
}

/// Tree-walk events. Every method is required.
pub trait Listener {
    type Scope;
    type Error;

    /// Before anything else; declares globals and yields the global scope.
    fn enter_program(&mut self, program: &Root) -> Result<Self::Scope, Self::Error>;
    /// Declares the function, its parameters and locals; yields the function scope.
    fn enter_function(
        &mut self,
        global: &Self::Scope,
        func: &FuncDecl,
    ) -> Result<Self::Scope, Self::Error>;
    /// After the whole body. Consumes the function scope.
    fn exit_function(&mut self, func: &FuncDecl, scope: Self::Scope) -> Result<(), Self::Error>;
    fn enter_main(&mut self, global: &Self::Scope, main: &Block) -> Result<(), Self::Error>;
    fn exit_program(&mut self, program: &Root, global: Self::Scope) -> Result<(), Self::Error>;

    fn exit_assign(
        &mut self,
        scope: &Self::Scope,
        target: &str,
        stmt: &Stmt,
    ) -> Result<(), Self::Error>;
    fn exit_condition(
        &mut self,
        scope: &Self::Scope,
        of: ConditionOf,
        cond: &Expr,
    ) -> Result<(), Self::Error>;
    /// After the then-block of an `if`.
    fn exit_then(&mut self, scope: &Self::Scope, has_else: bool) -> Result<(), Self::Error>;
    /// After the else-block of an `if`.
    fn exit_else(&mut self, scope: &Self::Scope) -> Result<(), Self::Error>;
    /// Before the condition of a `while`.
    fn enter_while(&mut self, scope: &Self::Scope, stmt: &Stmt) -> Result<(), Self::Error>;
    /// After the body of a `while`.
    fn exit_while(&mut self, scope: &Self::Scope, stmt: &Stmt) -> Result<(), Self::Error>;
    fn exit_print(&mut self, scope: &Self::Scope, argc: usize, stmt: &Stmt)
        -> Result<(), Self::Error>;
    fn exit_return(&mut self, scope: &Self::Scope, stmt: &Stmt) -> Result<(), Self::Error>;

    fn exit_literal(
        &mut self,
        scope: &Self::Scope,
        value: &Literal,
        expr: &Expr,
    ) -> Result<(), Self::Error>;
    fn exit_ident(&mut self, scope: &Self::Scope, name: &str, expr: &Expr)
        -> Result<(), Self::Error>;
    fn exit_binary(&mut self, scope: &Self::Scope, op: BinOp, expr: &Expr)
        -> Result<(), Self::Error>;
    fn exit_unary(&mut self, scope: &Self::Scope, op: UnOp, expr: &Expr)
        -> Result<(), Self::Error>;
    /// After every argument of the call has been walked.
    fn exit_call(
        &mut self,
        scope: &Self::Scope,
        call: &Call,
        site: CallSite,
    ) -> Result<(), Self::Error>;
}

pub fn walk_program<L: Listener>(listener: &mut L, program: &Root) -> Result<(), L::Error> {
    let global = listener.enter_program(program)?;
    for func in &program.functions {
        let scope = listener.enter_function(&global, func)?;
        walk_block(listener, &scope, &func.body)?;
        listener.exit_function(func, scope)?;
    }
    listener.enter_main(&global, &program.main)?;
    walk_block(listener, &global, &program.main)?;
    listener.exit_program(program, global)
}

pub fn walk_block<L: Listener>(
    listener: &mut L,
    scope: &L::Scope,
    block: &Block,
) -> Result<(), L::Error> {
    for stmt in &block.stmts {
        walk_stmt(listener, scope, stmt)?;
    }
    Ok(())
}

pub fn walk_stmt<L: Listener>(
    listener: &mut L,
    scope: &L::Scope,
    stmt: &Stmt,
) -> Result<(), L::Error> {
    match stmt {
        Stmt::Assign { target, value, .. } => {
            walk_expr(listener, scope, value)?;
            listener.exit_assign(scope, target, stmt)
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
            ..
        } => {
            walk_expr(listener, scope, cond)?;
            listener.exit_condition(scope, ConditionOf::If, cond)?;
            walk_block(listener, scope, then_block)?;
            listener.exit_then(scope, else_block.is_some())?;
            if let Some(else_block) = else_block {
                walk_block(listener, scope, else_block)?;
                listener.exit_else(scope)?;
            }
            Ok(())
        }
        Stmt::While { cond, body, .. } => {
            listener.enter_while(scope, stmt)?;
            walk_expr(listener, scope, cond)?;
            listener.exit_condition(scope, ConditionOf::While, cond)?;
            walk_block(listener, scope, body)?;
            listener.exit_while(scope, stmt)
        }
        Stmt::Print { args, .. } => {
            for arg in args {
                walk_expr(listener, scope, arg)?;
            }
            listener.exit_print(scope, args.len(), stmt)
        }
        Stmt::Call(call) => walk_call(listener, scope, call, CallSite::Statement),
        Stmt::Return { value, .. } => {
            walk_expr(listener, scope, value)?;
            listener.exit_return(scope, stmt)
        }
    }
}

pub fn walk_expr<L: Listener>(
    listener: &mut L,
    scope: &L::Scope,
    expr: &Expr,
) -> Result<(), L::Error> {
    match expr {
        Expr::Literal { value, .. } => listener.exit_literal(scope, value, expr),
        Expr::Ident { name, .. } => listener.exit_ident(scope, name, expr),
        Expr::Binary { op, lhs, rhs, .. } => {
            walk_expr(listener, scope, lhs)?;
            walk_expr(listener, scope, rhs)?;
            listener.exit_binary(scope, *op, expr)
        }
        Expr::Unary { op, operand, .. } => {
            walk_expr(listener, scope, operand)?;
            listener.exit_unary(scope, *op, expr)
        }
        Expr::Call(call) => walk_call(listener, scope, call, CallSite::Expression),
    }
}

fn walk_call<L: Listener>(
    listener: &mut L,
    scope: &L::Scope,
    call: &Call,
    site: CallSite,
) -> Result<(), L::Error> {
    for arg in &call.args {
        walk_expr(listener, scope, arg)?;
    }
    listener.exit_call(scope, call, site)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    /// Records the event sequence as strings.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Listener for Trace {
        type Scope = String;
        type Error = ();

        fn enter_program(&mut self, p: &Root) -> Result<String, ()> {
            self.0.push(format!("program {}", p.name));
            Ok("global".into())
        }
        fn enter_function(&mut self, _: &String, f: &FuncDecl) -> Result<String, ()> {
            self.0.push(format!("enter {}", f.name));
            Ok(f.name.clone())
        }
        fn exit_function(&mut self, _: &FuncDecl, scope: String) -> Result<(), ()> {
            self.0.push(format!("exit {}", scope));
            Ok(())
        }
        fn enter_main(&mut self, _: &String, _: &Block) -> Result<(), ()> {
            self.0.push("main".into());
            Ok(())
        }
        fn exit_program(&mut self, _: &Root, _: String) -> Result<(), ()> {
            self.0.push("end".into());
            Ok(())
        }
        fn exit_assign(&mut self, s: &String, t: &str, _: &Stmt) -> Result<(), ()> {
            self.0.push(format!("{}: {} =", s, t));
            Ok(())
        }
        fn exit_condition(&mut self, _: &String, of: ConditionOf, _: &Expr) -> Result<(), ()> {
            self.0.push(format!("cond {:?}", of));
            Ok(())
        }
        fn exit_then(&mut self, _: &String, has_else: bool) -> Result<(), ()> {
            self.0.push(format!("then else={}", has_else));
            Ok(())
        }
        fn exit_else(&mut self, _: &String) -> Result<(), ()> {
            self.0.push("else".into());
            Ok(())
        }
        fn enter_while(&mut self, _: &String, _: &Stmt) -> Result<(), ()> {
            self.0.push("while".into());
            Ok(())
        }
        fn exit_while(&mut self, _: &String, _: &Stmt) -> Result<(), ()> {
            self.0.push("loop".into());
            Ok(())
        }
        fn exit_print(&mut self, _: &String, argc: usize, _: &Stmt) -> Result<(), ()> {
            self.0.push(format!("print {}", argc));
            Ok(())
        }
        fn exit_return(&mut self, _: &String, _: &Stmt) -> Result<(), ()> {
            self.0.push("return".into());
            Ok(())
        }
        fn exit_literal(&mut self, _: &String, v: &Literal, _: &Expr) -> Result<(), ()> {
            self.0.push(format!("lit {:?}", v));
            Ok(())
        }
        fn exit_ident(&mut self, _: &String, name: &str, _: &Expr) -> Result<(), ()> {
            self.0.push(format!("id {}", name));
            Ok(())
        }
        fn exit_binary(&mut self, _: &String, op: BinOp, _: &Expr) -> Result<(), ()> {
            self.0.push(format!("op {}", op));
            Ok(())
        }
        fn exit_unary(&mut self, _: &String, op: UnOp, _: &Expr) -> Result<(), ()> {
            self.0.push(format!("unary {:?}", op));
            Ok(())
        }
        fn exit_call(&mut self, _: &String, c: &Call, site: CallSite) -> Result<(), ()> {
            self.0.push(format!("call {} {:?}", c.callee, site));
            Ok(())
        }
    }

    fn sp() -> Span {
        Span::default()
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident {
            span: sp(),
            name: name.into(),
        }
    }

    fn int(n: i64) -> Expr {
        Expr::Literal {
            span: sp(),
            value: Literal::Int(n),
        }
    }

    #[test]
    fn events_follow_post_order_with_scope_values() {
        let program = Root {
            span: sp(),
            name: "demo".into(),
            globals: vec![],
            functions: vec![FuncDecl {
                span: sp(),
                name: "f".into(),
                return_ty: Some(Type::Int),
                params: vec![],
                locals: vec![],
                body: Block {
                    span: sp(),
                    stmts: vec![Stmt::Return {
                        span: sp(),
                        value: Expr::Binary {
                            span: sp(),
                            op: BinOp::Add,
                            lhs: Box::new(int(1)),
                            rhs: Box::new(int(2)),
                        },
                    }],
                },
            }],
            main: Block {
                span: sp(),
                stmts: vec![
                    Stmt::While {
                        span: sp(),
                        cond: Expr::Binary {
                            span: sp(),
                            op: BinOp::Lt,
                            lhs: Box::new(ident("i")),
                            rhs: Box::new(int(3)),
                        },
                        body: Block {
                            span: sp(),
                            stmts: vec![Stmt::Assign {
                                span: sp(),
                                target: "i".into(),
                                value: Expr::Call(Call {
                                    span: sp(),
                                    callee: "f".into(),
                                    args: vec![],
                                }),
                            }],
                        },
                    },
                    Stmt::If {
                        span: sp(),
                        cond: ident("b"),
                        then_block: Block {
                            span: sp(),
                            stmts: vec![Stmt::Print {
                                span: sp(),
                                args: vec![],
                            }],
                        },
                        else_block: None,
                    },
                ],
            },
        };

        let mut trace = Trace::default();
        walk_program(&mut trace, &program).unwrap();
        assert_eq!(
            trace.0,
            vec![
                "program demo",
                "enter f",
                "lit Int(1)",
                "lit Int(2)",
                "op +",
                "return",
                "exit f",
                "main",
                "while",
                "id i",
                "lit Int(3)",
                "op <",
                "cond While",
                "call f Expression",
                "global: i =",
                "loop",
                "id b",
                "cond If",
                "print 0",
                "then else=false",
                "end",
            ]
        );
    }
}
