use jasm::ast::{InsnNode, Modifier, Param};
use jasm::opcodes::Opcode;
use jasm::verify::{Value, VerifyRule};
use jasm::{Config, Error, MethodAssembler, Result};

mod common;
use common::{init_logging, Body};

fn verify(body: Body) -> Result<Vec<Option<jasm::verify::Frame>>> {
    verify_with(Config::default(), body)
}

fn verify_with(config: Config, body: Body) -> Result<Vec<Option<jasm::verify::Frame>>> {
    init_logging();
    let assembly = MethodAssembler::new("Demo", config).compile(&body.parsed())?;
    Ok(assembly.frames.unwrap_or_default())
}

/// Index, line and rule of a verification failure
fn failure(result: Result<Vec<Option<jasm::verify::Frame>>>) -> (usize, Option<usize>, VerifyRule) {
    match result {
        Err(Error::Verification { index, line, rule, .. }) => (index, line, rule),
        other => panic!("expected verification failure, got {:?}", other),
    }
}

#[test]
fn test_stack_underflow() {
    let body = Body::static_void("run").op(Opcode::Pop).op(Opcode::Return);
    let (index, line, rule) = failure(verify(body));
    assert_eq!(index, 0);
    assert_eq!(line, Some(2));
    assert_eq!(rule, VerifyRule::StackUnderflow { needed: 1, available: 0 });
}

#[test]
fn test_iadd_on_long() {
    let body = Body::static_void("run")
        .op(Opcode::Lconst1)
        .op(Opcode::Iconst1)
        .op(Opcode::Iadd)
        .op(Opcode::Return);
    let (index, line, rule) = failure(verify(body));
    assert_eq!(index, 2);
    assert_eq!(line, Some(4));
    assert!(matches!(rule, VerifyRule::TypeMismatch { .. }));
}

#[test]
fn test_falls_off_end() {
    let body = Body::static_void("run").op(Opcode::Iconst0).op(Opcode::Pop);
    let (_, _, rule) = failure(verify(body));
    assert_eq!(rule, VerifyRule::FallsOffEnd);
}

#[test]
fn test_empty_body_falls_off_end() {
    let (_, _, rule) = failure(verify(Body::static_void("run")));
    assert_eq!(rule, VerifyRule::FallsOffEnd);
}

#[test]
fn test_return_type_must_match() {
    let body = Body::method(vec![Modifier::Static], "get", vec![], "I")
        .op(Opcode::Lconst0)
        .op(Opcode::Lreturn);
    let (index, _, rule) = failure(verify(body));
    assert_eq!(index, 1);
    assert!(matches!(rule, VerifyRule::ReturnMismatch { .. }));
}

#[test]
fn test_loop_converges() -> Result<()> {
    let body = Body::method(vec![Modifier::Static], "count", vec![Param::new("n", "I")], "V")
        .label("head")
        .insn(InsnNode::iinc("n", -1))
        .var(Opcode::Iload, "n")
        .jump(Opcode::Ifgt, "head")
        .op(Opcode::Return);
    let frames = verify(body)?;
    assert_eq!(frames.len(), 5);
    for frame in &frames {
        let frame = frame.as_ref().expect("reachable");
        assert_eq!(frame.local(0), Some(&Value::Int));
    }
    Ok(())
}

#[test]
fn test_branches_merge_references() -> Result<()> {
    let body = Body::method(vec![Modifier::Static], "pick", vec![Param::new("flag", "Z")], "Ljava/lang/Object;")
        .var(Opcode::Iload, "flag")
        .jump(Opcode::Ifeq, "other")
        .insn(InsnNode::ldc(jasm::codegen::Constant::String("yes".to_string())))
        .jump(Opcode::Goto, "done")
        .label("other")
        .op(Opcode::AconstNull)
        .label("done")
        .op(Opcode::Areturn);
    let frames = verify(body)?;
    let at_return = frames[7].as_ref().expect("reachable");
    assert_eq!(at_return.stack(), &[Value::reference("java/lang/String")]);
    Ok(())
}

#[test]
fn test_handler_entered_by_fall_through() {
    let body = Body::static_void("run")
        .try_catch("start", "end", "end", None)
        .label("start")
        .op(Opcode::Nop)
        .label("end")
        .op(Opcode::Athrow);
    let (_, _, rule) = failure(verify(body));
    assert!(matches!(rule, VerifyRule::HandlerReachedOutsideRange { handler: 2, .. }));
}

#[test]
fn test_handler_sees_caught_type() -> Result<()> {
    let body = Body::static_void("run")
        .try_catch("start", "end", "handler", Some("java/io/IOException"))
        .label("start")
        .op(Opcode::Nop)
        .label("end")
        .op(Opcode::Return)
        .label("handler")
        .var(Opcode::Astore, "e")
        .op(Opcode::Return);
    let frames = verify(body)?;
    let at_store = frames[5].as_ref().expect("reachable");
    assert_eq!(at_store.stack(), &[Value::reference("java/io/IOException")]);
    Ok(())
}

#[test]
fn test_store_inside_range_is_not_visible_to_handler() -> Result<()> {
    let body = Body::static_void("run")
        .try_catch("start", "end", "handler", None)
        .label("start")
        .op(Opcode::Iconst1)
        .var(Opcode::Istore, "x")
        .op(Opcode::Nop)
        .label("end")
        .op(Opcode::Return)
        .label("handler")
        .var(Opcode::Astore, "e")
        .op(Opcode::Return);
    let frames = verify(body)?;
    let after_store = frames[3].as_ref().expect("reachable");
    assert_eq!(after_store.local(0), Some(&Value::Int));

    // edges from ICONST_1 and ISTORE carry the frame before the store
    let at_handler = frames[7].as_ref().expect("reachable");
    assert_eq!(at_handler.stack(), &[Value::reference("java/lang/Throwable")]);
    assert_eq!(at_handler.local(0), Some(&Value::Empty));
    Ok(())
}

#[test]
fn test_handler_reading_store_from_inside_range() {
    let body = Body::static_void("run")
        .try_catch("start", "end", "handler", None)
        .label("start")
        .op(Opcode::Iconst1)
        .var(Opcode::Istore, "x")
        .op(Opcode::Nop)
        .label("end")
        .op(Opcode::Return)
        .label("handler")
        .var(Opcode::Iload, "x")
        .op(Opcode::Pop)
        .op(Opcode::Pop)
        .op(Opcode::Return);
    let (index, line, rule) = failure(verify(body));
    assert_eq!(index, 7);
    assert_eq!(line, Some(10));
    assert_eq!(rule, VerifyRule::EmptyLocal { slot: 0 });
}

#[test]
fn test_handler_sees_store_before_range() -> Result<()> {
    let body = Body::static_void("run")
        .try_catch("start", "end", "handler", None)
        .op(Opcode::Iconst1)
        .var(Opcode::Istore, "x")
        .label("start")
        .op(Opcode::Nop)
        .label("end")
        .op(Opcode::Return)
        .label("handler")
        .var(Opcode::Iload, "x")
        .op(Opcode::Pop)
        .op(Opcode::Pop)
        .op(Opcode::Return);
    let frames = verify(body)?;
    let at_load = frames[7].as_ref().expect("reachable");
    assert_eq!(at_load.local(0), Some(&Value::Int));
    assert_eq!(at_load.stack(), &[Value::reference("java/lang/Throwable")]);
    Ok(())
}

#[test]
fn test_iteration_cap() {
    let body = Body::static_void("spin").label("head").jump(Opcode::Goto, "head");
    let config = Config::default().with_max_verify_iterations(1);
    let (_, _, rule) = failure(verify_with(config, body));
    assert_eq!(rule, VerifyRule::IterationLimit { limit: 1 });
}

#[test]
fn test_configured_stack_limit() {
    let body = Body::static_void("run")
        .op(Opcode::Iconst0)
        .op(Opcode::Iconst0)
        .op(Opcode::Pop2)
        .op(Opcode::Return);
    let (index, _, rule) = failure(verify_with(Config::default().with_max_stack(1), body));
    assert_eq!(index, 1);
    assert_eq!(rule, VerifyRule::StackOverflow { max: 1 });
}

#[test]
fn test_constructor_must_initialize_receiver() {
    let body = Body::method(vec![Modifier::Public], "<init>", vec![], "V").op(Opcode::Return);
    let (index, _, _) = failure(verify(body));
    assert_eq!(index, 0);
}

#[test]
fn test_constructor_calling_super() -> Result<()> {
    let body = Body::method(vec![Modifier::Public], "<init>", vec![], "V")
        .var(Opcode::Aload, "this")
        .insn(InsnNode::method(Opcode::Invokespecial, "java/lang/Object", "<init>", "()V"))
        .op(Opcode::Return);
    let frames = verify(body)?;
    assert_eq!(
        frames[0].as_ref().and_then(|f| f.local(0).cloned()),
        Some(Value::UninitializedThis("Demo".to_string()))
    );
    assert_eq!(frames[2].as_ref().and_then(|f| f.local(0).cloned()), Some(Value::reference("Demo")));
    Ok(())
}

#[test]
fn test_error_message_names_instruction() {
    let body = Body::static_void("run").op(Opcode::Pop).op(Opcode::Return);
    let err = verify(body).expect_err("rejected");
    assert_eq!(err.line(), Some(2));
    let message = err.to_string();
    assert!(message.contains("POP"), "{}", message);
    assert!(message.contains("stack underflow"), "{}", message);
}
