use super::*;
use crate::codegen::writer::Transfer;
use crate::frontend::reader::Reader;
use crate::hack::rom::Rom;
use crate::hack::{ARG, Cpu, LCL, SP, THAT, THIS, assemble};
use crate::lang::command::{ArithOp, Command};
use crate::lang::segment::Segment;

// =============================================================================
// Helpers
// =============================================================================

/// Inline by default, with a few routines of every kind shared.
fn mostly_inline() -> LoweringPolicy {
    LoweringPolicy::inline()
        .with(Routine::PushLocal, Lowering::Subroutine)
        .with(Routine::PopThat, Lowering::Subroutine)
        .with(Routine::Eq, Lowering::Subroutine)
        .with(Routine::Return, Lowering::Subroutine)
}

/// Shared by default, with calls and the cheapest routines inline.
fn mostly_shared() -> LoweringPolicy {
    LoweringPolicy::shared()
        .with(Routine::Call, Lowering::Inline)
        .with(Routine::Add, Lowering::Inline)
        .with(Routine::PushArgument, Lowering::Inline)
        .with(Routine::PopLocal, Lowering::Inline)
}

/// Every combination of lowering policy and stack form, mixed policies
/// included.
fn all_configs() -> Vec<GenConfig> {
    let mut configs = Vec::new();
    for lowering in [
        LoweringPolicy::inline(),
        LoweringPolicy::shared(),
        mostly_inline(),
        mostly_shared(),
    ] {
        for stack_form in [StackForm::Combined, StackForm::Split] {
            configs.push(GenConfig {
                lowering: lowering.clone(),
                stack_form,
                annotate: false,
            });
        }
    }
    configs
}

fn generate(config: &GenConfig, modules: &[(&str, &str)], bootstrap: bool) -> String {
    let mut writer = CodeWriter::new(Vec::new(), config.clone());
    if bootstrap {
        writer.begin_program().unwrap();
    }
    for (name, source) in modules {
        writer.begin_module(name).unwrap();
        for item in Reader::new(source) {
            writer.write_command(&item.unwrap().command).unwrap();
        }
    }
    String::from_utf8(writer.finish().unwrap()).unwrap()
}

fn build(config: &GenConfig, modules: &[(&str, &str)], bootstrap: bool) -> Rom {
    let asm = generate(config, modules, bootstrap);
    assemble(&asm).unwrap_or_else(|e| panic!("{}\n{}", e, asm))
}

/// CPU with a hand-made frame, as if a function were already running.
fn framed_cpu() -> Cpu {
    let mut cpu = Cpu::default();
    cpu.set_ram(SP, 256);
    cpu.set_ram(LCL, 300);
    cpu.set_ram(ARG, 400);
    cpu.set_ram(THIS, 3000);
    cpu.set_ram(THAT, 3010);
    cpu
}

/// Runs `body` inside function `Test` (plus any `extra` functions placed
/// after it) until it reaches the `HALT` label.
fn run_fragment_with(config: &GenConfig, body: &str, extra: &str) -> Cpu {
    let source = format!("function Test 0\n{}\nlabel HALT\ngoto HALT\n{}", body, extra);
    let rom = build(config, &[("Test", source.as_str())], false);

    let mut cpu = framed_cpu();
    cpu.run_until(&rom, rom.address_of("Test$HALT").unwrap())
        .unwrap();
    cpu
}

fn run_fragment(config: &GenConfig, body: &str) -> Cpu {
    run_fragment_with(config, body, "")
}

/// Runs a whole program from the bootstrap until `halt` is reached.
fn run_program(config: &GenConfig, modules: &[(&str, &str)], halt: &str) -> Cpu {
    let rom = build(config, modules, true);
    let mut cpu = Cpu::default();
    cpu.run_until(&rom, rom.address_of(halt).unwrap()).unwrap();
    cpu
}

/// RAM with the routine scratch cells masked out.
fn visible_ram(cpu: &Cpu) -> Vec<u16> {
    let mut ram = cpu.ram_slice().to_vec();
    for cell in 13..=15 {
        ram[cell] = 0;
    }
    ram
}

fn push(value: i16) -> String {
    if value < 0 {
        format!("push constant {}\nneg", -value)
    } else {
        format!("push constant {}", value)
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn test_binary_results() {
    let cases = [
        (ArithOp::Add, 7, 8, 15),
        (ArithOp::Add, -3, 5, 2),
        (ArithOp::Sub, 7, 8, -1),
        (ArithOp::Sub, 8, -7, 15),
        (ArithOp::And, 12, 10, 8),
        (ArithOp::Or, 12, 10, 14),
        (ArithOp::Eq, 5, 5, -1),
        (ArithOp::Eq, 5, 6, 0),
        (ArithOp::Lt, 3, 9, -1),
        (ArithOp::Lt, 9, 3, 0),
        (ArithOp::Lt, 4, 4, 0),
        (ArithOp::Gt, 9, 3, -1),
        (ArithOp::Gt, -9, 3, 0),
        (ArithOp::Gt, 4, 4, 0),
    ];

    for config in all_configs() {
        for (op, x, y, expected) in cases {
            let body = format!("{}\n{}\n{}", push(x), push(y), op.name());
            let cpu = run_fragment(&config, &body);

            assert_eq!(cpu.sp(), 257, "{:?} {} {}", op, x, y);
            assert_eq!(cpu.stack_top(), Some(expected), "{:?} {} {}", op, x, y);
        }
    }
}

#[test]
fn test_unary_results() {
    for config in all_configs() {
        let cpu = run_fragment(&config, "push constant 5\nneg");
        assert_eq!(cpu.stack_top(), Some(-5));

        let cpu = run_fragment(&config, "push constant 0\nnot");
        assert_eq!(cpu.stack_top(), Some(-1));

        let cpu = run_fragment(&config, "push constant 12\nnot");
        assert_eq!(cpu.stack_top(), Some(!12));
        assert_eq!(cpu.sp(), 257);
    }
}

#[test]
fn test_every_lowering_leaves_identical_machine_state() {
    let operands = [(7, 8), (8, 7), (-2, 3), (0, 0)];

    for op in ArithOp::ALL {
        for (x, y) in operands {
            let body = if op.is_unary() {
                format!("{}\n{}\n{}", push(x), push(y), op.name())
            } else {
                format!("{}\n{}\n{}\npop temp 3\npush temp 3", push(x), push(y), op.name())
            };

            let states: Vec<Vec<u16>> = all_configs()
                .iter()
                .map(|config| visible_ram(&run_fragment(config, &body)))
                .collect();

            for state in &states[1..] {
                assert!(state == &states[0], "{:?} {} {} diverged", op, x, y);
            }
        }
    }
}

#[test]
fn test_relational_labels_never_collide() {
    let body = "push constant 1\npush constant 1\neq\npush constant 2\npush constant 1\ngt\nand";
    for config in all_configs() {
        let cpu = run_fragment(&config, body);
        assert_eq!(cpu.stack_top(), Some(-1));
    }

    let asm = generate(
        &GenConfig {
            lowering: LoweringPolicy::inline(),
            ..GenConfig::default()
        },
        &[("Test", "function Test 0\neq\nlt")],
        false,
    );
    for label in ["(Test:0)", "(Test:1)", "(Test:2)", "(Test:3)"] {
        assert_eq!(asm.matches(label).count(), 1, "{}", label);
    }
}

// =============================================================================
// Push / pop
// =============================================================================

#[test]
fn test_push_pop_round_trip_per_segment() {
    let slots = [
        (Segment::Local, 2, 302),
        (Segment::Argument, 1, 401),
        (Segment::This, 6, 3006),
        (Segment::That, 5, 3015),
        (Segment::Temp, 6, 11),
        (Segment::Pointer, 1, 4),
    ];

    for config in all_configs() {
        for (segment, index, address) in slots {
            let body = format!("push constant 1234\npop {} {}", segment, index);
            let cpu = run_fragment(&config, &body);

            assert_eq!(cpu.ram(address), 1234, "{} {}", segment, index);
            assert_eq!(cpu.sp(), 256, "{} {}", segment, index);

            let body = format!("{}\npush {} {}", body, segment, index);
            let cpu = run_fragment(&config, &body);
            assert_eq!(cpu.stack_top(), Some(1234), "{} {}", segment, index);
        }
    }
}

#[test]
fn test_static_round_trip() {
    for config in all_configs() {
        let body = "push constant 77\npop static 4\npush static 4\npush static 4\nadd";
        let cpu = run_fragment(&config, body);
        assert_eq!(cpu.stack_top(), Some(154));
        assert_eq!(cpu.sp(), 257);
    }
}

#[test]
fn test_pointer_moves_this_and_that() {
    for config in all_configs() {
        let body = "\
push constant 5000
pop pointer 0
push constant 6000
pop pointer 1
push constant 11
pop this 2
push constant 22
pop that 3";
        let cpu = run_fragment(&config, body);
        assert_eq!(cpu.ram(THIS), 5000);
        assert_eq!(cpu.ram(THAT), 6000);
        assert_eq!(cpu.ram(5002), 11);
        assert_eq!(cpu.ram(6003), 22);
    }
}

#[test]
fn test_pop_constant_discards() {
    for config in all_configs() {
        let cpu = run_fragment(&config, "push constant 1\npush constant 9\npop constant 0");
        assert_eq!(cpu.sp(), 257);
        assert_eq!(cpu.stack_top(), Some(1));
    }
}

#[test]
fn test_combined_primitives_are_shorter() {
    let body = "function Test 0\npush constant 1\npop temp 0\nneg";
    let count = |stack_form| {
        let config = GenConfig {
            lowering: LoweringPolicy::inline(),
            stack_form,
            annotate: false,
        };
        build(&config, &[("Test", body)], false).len()
    };
    assert!(count(StackForm::Combined) < count(StackForm::Split));
}

// =============================================================================
// Branching and labels
// =============================================================================

#[test]
fn test_loop_with_if_goto() {
    // sum = 5 + 4 + 3 + 2 + 1
    let body = "\
push constant 5
pop temp 0
push constant 0
pop temp 1
label LOOP
push temp 1
push temp 0
add
pop temp 1
push temp 0
push constant 1
sub
pop temp 0
push temp 0
if-goto LOOP
push temp 1";

    for config in all_configs() {
        let cpu = run_fragment(&config, body);
        assert_eq!(cpu.stack_top(), Some(15));
        assert_eq!(cpu.sp(), 257);
    }
}

#[test]
fn test_if_goto_falls_through_on_zero() {
    for config in all_configs() {
        let body = "push constant 0\nif-goto SKIP\npush constant 1\nlabel SKIP\npush constant 2";
        let cpu = run_fragment(&config, body);
        assert_eq!(cpu.sp(), 258);
        assert_eq!(cpu.stack_top(), Some(2));
    }
}

#[test]
fn test_same_label_in_two_functions() {
    let first = "\
function F1 0
goto L
push constant 111
label L
push constant 1
label HALT
goto HALT
";
    let second = "\
function F2 0
label L
push constant 222
goto L
";

    for config in all_configs() {
        let rom = build(&config, &[("Test", first), ("Other", second)], false);
        assert_ne!(rom.address_of("F1$L"), rom.address_of("F2$L"));

        let mut cpu = framed_cpu();
        cpu.run_until(&rom, rom.address_of("F1$HALT").unwrap())
            .unwrap();
        assert_eq!(cpu.sp(), 257);
        assert_eq!(cpu.stack_top(), Some(1));
    }
}

// =============================================================================
// Calls
// =============================================================================

const CALLEE: &str = "\
function Callee 3
push constant 5000
pop pointer 0
push constant 6000
pop pointer 1
push local 2
push argument 0
push argument 1
add
add
return
";

#[test]
fn test_call_restores_caller_frame() {
    for config in all_configs() {
        let cpu = run_fragment_with(
            &config,
            "push constant 11\npush constant 22\ncall Callee 2",
            CALLEE,
        );

        assert_eq!(cpu.sp(), 257);
        assert_eq!(cpu.stack_top(), Some(33));
        assert_eq!(cpu.ram(LCL), 300);
        assert_eq!(cpu.ram(ARG), 400);
        assert_eq!(cpu.ram(THIS), 3000);
        assert_eq!(cpu.ram(THAT), 3010);
    }
}

#[test]
fn test_call_with_no_arguments() {
    let callee = "function Seven 0\npush constant 7\nreturn\n";
    for config in all_configs() {
        let cpu = run_fragment_with(&config, "push constant 1\ncall Seven 0\nadd", callee);
        assert_eq!(cpu.sp(), 257);
        assert_eq!(cpu.stack_top(), Some(8));
        assert_eq!(cpu.ram(LCL), 300);
    }
}

#[test]
fn test_callee_frame_layout() {
    let callee = "\
function Inspect 2
push argument 2
pop temp 0
push local 1
pop temp 1
push constant 0
return
";
    let source = format!(
        "function Test 0\npush constant 10\npush constant 20\npush constant 30\n\
         call Inspect 3\npop temp 7\nlabel HALT\ngoto HALT\n{}",
        callee
    );

    for config in all_configs() {
        let rom = build(&config, &[("Test", source.as_str())], false);
        let mut cpu = framed_cpu();
        // arguments at 256..259, saved frame at 259..264, locals from 264
        cpu.set_ram(264, 999);
        cpu.set_ram(265, 999);
        cpu.set_ram(5, 1);
        cpu.set_ram(6, 1);

        cpu.run_until(&rom, rom.address_of("Test$HALT").unwrap())
            .unwrap();

        assert_eq!(cpu.ram(5), 30);
        assert_eq!(cpu.ram(6), 0);
        assert_eq!(cpu.ram(12), 0);
        assert_eq!(cpu.sp(), 256);
    }
}

// =============================================================================
// Whole programs
// =============================================================================

const SYS_FACTORIAL: &str = "\
function Sys.init 0
push constant 5
call Main.fact 1
label HALT
goto HALT
";

const MAIN_FACTORIAL: &str = "\
function Main.fact 0
push argument 0
push constant 1
gt
if-goto RECURSE
push constant 1
return
label RECURSE
push argument 0
push argument 0
push constant 1
sub
call Main.fact 1
call Math.multiply 2
return
";

const MATH_MULTIPLY: &str = "\
// repeated addition: local 0 accumulates, local 1 counts down
function Math.multiply 2
push argument 1
pop local 1
label LOOP
push local 1
push constant 0
eq
if-goto DONE
push local 0
push argument 0
add
pop local 0
push local 1
push constant 1
sub
pop local 1
goto LOOP
label DONE
push local 0
return
";

#[test]
fn test_recursive_factorial() {
    for config in all_configs() {
        let cpu = run_program(
            &config,
            &[
                ("Sys.vm", SYS_FACTORIAL),
                ("Main.vm", MAIN_FACTORIAL),
                ("Math.vm", MATH_MULTIPLY),
            ],
            "Sys.init$HALT",
        );

        // bootstrap frame is 5 words above the stack base
        assert_eq!(cpu.ram(LCL), 261);
        assert_eq!(cpu.ram(ARG), 256);
        assert_eq!(cpu.sp(), 262);
        assert_eq!(cpu.stack_top(), Some(120));
    }
}

#[test]
fn test_mixed_policies_match_presets() {
    let modules = [
        ("Sys.vm", SYS_FACTORIAL),
        ("Main.vm", MAIN_FACTORIAL),
        ("Math.vm", MATH_MULTIPLY),
    ];
    let run = |lowering: LoweringPolicy| {
        let config = GenConfig {
            lowering,
            ..GenConfig::default()
        };
        run_program(&config, &modules, "Sys.init$HALT").frame_summary()
    };

    let inline = run(LoweringPolicy::inline());
    assert_eq!(run(LoweringPolicy::shared()), inline);
    assert_eq!(run(mostly_inline()), inline);
    assert_eq!(run(mostly_shared()), inline);
    assert!(inline.ends_with("top=120"));
}

#[test]
fn test_add_into_local() {
    let sys = "\
function Sys.init 1
push constant 7
push constant 8
add
pop local 0
label HALT
goto HALT
";
    for config in all_configs() {
        let cpu = run_program(&config, &[("Sys.vm", sys)], "Sys.init$HALT");
        let lcl = cpu.ram(LCL);
        assert_eq!(cpu.ram(lcl), 15);
        assert_eq!(cpu.sp(), lcl + 1);
    }
}

#[test]
fn test_statics_are_per_module() {
    let sys = "\
function Sys.init 0
push constant 11
pop static 0
call Other.write 0
pop temp 0
call Other.read 0
push static 0
label HALT
goto HALT
";
    let other = "\
function Other.write 0
push constant 99
pop static 0
push constant 0
return
function Other.read 0
push static 0
return
";
    for config in all_configs() {
        let rom = build(&config, &[("Sys.vm", sys), ("Other.vm", other)], true);
        let sys_static = rom.address_of("Sys.0").unwrap();
        let other_static = rom.address_of("Other.0").unwrap();
        assert_ne!(sys_static, other_static);

        let mut cpu = Cpu::default();
        cpu.run_until(&rom, rom.address_of("Sys.init$HALT").unwrap())
            .unwrap();
        assert_eq!(cpu.ram(sys_static), 11);
        assert_eq!(cpu.ram(other_static), 99);
        assert_eq!(cpu.stack_top(), Some(11));
        assert_eq!(cpu.word(cpu.sp() - 2), 99);
    }
}

// =============================================================================
// Output shape
// =============================================================================

#[test]
fn test_bootstrap_calls_entry_function() {
    let asm = generate(&GenConfig::default(), &[], true);
    assert!(asm.starts_with("@256\nD=A\n@SP\nM=D\n"));
    assert!(asm.contains("@Sys.init\n0;JMP\n"));
}

#[test]
fn test_library_follows_policy() {
    let asm = generate(
        &GenConfig::default(),
        &[("Test", "function Test 0\nadd")],
        false,
    );
    for routine in Routine::ALL {
        assert!(asm.contains(&format!("({})", routine.label())), "{:?}", routine);
    }

    let inline = GenConfig {
        lowering: LoweringPolicy::inline(),
        ..GenConfig::default()
    };
    let asm = generate(&inline, &[("Test", "function Test 0\nadd")], false);
    assert!(!asm.contains("($"));

    let only_call = GenConfig {
        lowering: LoweringPolicy::inline().with(Routine::Call, Lowering::Subroutine),
        ..GenConfig::default()
    };
    let asm = generate(&only_call, &[("Test", "function Test 0\nadd")], false);
    assert!(asm.contains("($call)"));
    assert!(!asm.contains("($add)"));
    assert!(!asm.contains("@$add"));
}

#[test]
fn test_shared_lowering_is_smaller_for_repetitive_code() {
    let mut source = String::from("function Test 3\n");
    for _ in 0..40 {
        source.push_str("push local 0\npush local 1\nlt\npop local 2\n");
    }
    let modules = [("Test", source.as_str())];

    let inline = GenConfig {
        lowering: LoweringPolicy::inline(),
        ..GenConfig::default()
    };
    let shared = build(&GenConfig::default(), &modules, false);
    let inline = build(&inline, &modules, false);
    assert!(shared.len() < inline.len());
}

#[test]
fn test_annotation_is_cosmetic() {
    let modules = [("Sys.vm", SYS_FACTORIAL), ("Main.vm", MAIN_FACTORIAL)];
    let annotated = GenConfig {
        annotate: true,
        ..GenConfig::default()
    };

    let text = generate(&annotated, &modules, true);
    assert!(text.contains("// push constant 5"));
    assert!(text.contains("// ROM[00000]"));

    let plain = generate(&GenConfig::default(), &modules, true);
    assert!(!plain.contains("//"));

    let with = assemble(&text).unwrap();
    let without = assemble(&plain).unwrap();
    assert_eq!(with.words, without.words);
}

#[test]
fn test_unknown_command_emits_nothing() {
    let mut writer = CodeWriter::new(Vec::new(), GenConfig::default());
    writer.begin_module("Test.vm").unwrap();
    writer
        .write_command(&Command::Unknown("mul".to_string()))
        .unwrap();
    assert_eq!(writer.instruction_count(), 0);
}

#[test]
fn test_instruction_count_matches_assembled_size() {
    let mut writer = CodeWriter::new(Vec::new(), GenConfig::default());
    writer.begin_program().unwrap();
    writer.begin_module("Main.vm").unwrap();
    for item in Reader::new(MAIN_FACTORIAL) {
        writer.write_command(&item.unwrap().command).unwrap();
    }
    let before_library = writer.instruction_count();
    let text = String::from_utf8(writer.finish().unwrap()).unwrap();

    let rom = assemble(&text).unwrap();
    assert_eq!(
        rom.address_of(Routine::ALL[0].label()),
        Some(before_library as u16)
    );
}

#[test]
fn test_module_and_function_context() {
    let mut writer = CodeWriter::new(Vec::new(), GenConfig::default());
    writer.begin_module("dir/Main.vm").unwrap();
    assert_eq!(writer.state().module, "Main");

    writer.write_function("Main.main", 0).unwrap();
    writer.write_arithmetic(ArithOp::Eq).unwrap();
    assert_eq!(writer.state().function, "Main.main");
    assert!(writer.state().label_index > 0);

    writer.write_function("Main.next", 0).unwrap();
    assert_eq!(writer.state().label_index, 0);

    writer.write_push_pop(Transfer::Push, Segment::Static, 2).unwrap();
    let text = String::from_utf8(writer.finish().unwrap()).unwrap();
    assert!(text.contains("@Main.2\n"));
}

#[test]
fn test_fixed_segment_index_is_checked() {
    let mut writer = CodeWriter::new(Vec::new(), GenConfig::default());
    writer.begin_module("Test.vm").unwrap();

    let err = writer
        .write_push_pop(Transfer::Push, Segment::Temp, 65535)
        .unwrap_err();
    assert!(matches!(
        err,
        CodegenError::IndexOutOfRange {
            segment: Segment::Temp,
            index: 65535
        }
    ));
    assert_eq!(err.to_string(), "temp index 65535 is out of range (0..=7)");

    assert!(
        writer
            .write_push_pop(Transfer::Pop, Segment::Pointer, 2)
            .is_err()
    );
    assert!(
        writer
            .write_push_pop(Transfer::Push, Segment::Constant, 32768)
            .is_err()
    );
    assert_eq!(writer.instruction_count(), 0);
}

#[test]
fn test_step_notes_follow_annotation() {
    let annotated = GenConfig {
        annotate: true,
        ..GenConfig::default()
    };
    let text = generate(
        &annotated,
        &[("Test", "function Test 2\npush local 1\ncall Test 0")],
        false,
    );
    assert!(text.contains("// clear local segment\n"));
    assert!(text.contains("// R13 = index\n"));
    assert!(text.contains("// goto Test\n"));
    assert!(text.contains("// *ARG = pop()\n"));

    let plain = generate(
        &GenConfig::default(),
        &[("Test", "function Test 2\npush local 1\ncall Test 0")],
        false,
    );
    assert!(!plain.contains("R13 = index"));
}

#[test]
fn test_library_is_emitted_once() {
    let mut writer = CodeWriter::new(Vec::new(), GenConfig::default());
    writer.begin_module("Test.vm").unwrap();
    writer.write_arithmetic(ArithOp::Add).unwrap();
    writer.end_program().unwrap();
    let after_first = writer.instruction_count();
    writer.end_program().unwrap();
    assert_eq!(writer.instruction_count(), after_first);

    let text = String::from_utf8(writer.finish().unwrap()).unwrap();
    assert_eq!(text.matches("($add)").count(), 1);
}
