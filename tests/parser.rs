// tests/parser.rs
use tomasulo_rust::asm::AsmParser;
use tomasulo_rust::engine::instruction::{Operation, Reg};
use tomasulo_rust::errors::SimulatorError;

fn reg(n: u8) -> Reg {
    Reg::new(n).expect("register number in range")
}

#[test]
fn test_parse_add() {
    let mut parser = AsmParser::new();
    let program = parser.parse_program("ADD R1, R2, R3").expect("parse");
    assert_eq!(program.len(), 1);
    assert_eq!(
        program[0].op,
        Operation::Add {
            rd: reg(1),
            rs: reg(2),
            rt: reg(3)
        }
    );
    assert_eq!(program[0].pc, 0);
}

#[test]
fn test_parse_addi_with_negative_immediate() {
    let mut parser = AsmParser::new();
    let program = parser.parse_program("ADDI R1, R2, -10").expect("parse");
    assert_eq!(
        program[0].op,
        Operation::Addi {
            rd: reg(1),
            rs: reg(2),
            imm: -10
        }
    );
}

#[test]
fn test_parse_loads_and_stores() {
    let mut parser = AsmParser::new();
    let program = parser
        .parse_program("LW R1, 4(R2)\nSW R3, -8(R4)")
        .expect("parse");
    assert_eq!(
        program[0].op,
        Operation::Lw {
            rd: reg(1),
            base: reg(2),
            offset: 4
        }
    );
    assert_eq!(
        program[1].op,
        Operation::Sw {
            rt: reg(3),
            base: reg(4),
            offset: -8
        }
    );
}

#[test]
fn test_parse_branches_and_jump() {
    let mut parser = AsmParser::new();
    let program = parser
        .parse_program("BEQ R1, R2, done\nBNE R3, R4, loop\nJ done\nNOP")
        .expect("parse");
    assert_eq!(
        program[0].op,
        Operation::Beq {
            rs: reg(1),
            rt: reg(2),
            target: "done".to_string()
        }
    );
    assert_eq!(
        program[1].op,
        Operation::Bne {
            rs: reg(3),
            rt: reg(4),
            target: "loop".to_string()
        }
    );
    assert_eq!(
        program[2].op,
        Operation::J {
            target: "done".to_string()
        }
    );
    assert_eq!(program[3].op, Operation::Nop);
}

#[test]
fn test_parse_program_with_comments_and_labels() {
    let source = "
        # initialize
        ADDI R1, R0, 10   # R1 = 10
        loop: ADDI R2, R0, 20
        ADD R3, R1, R2

        end:
        NOP
    ";
    let mut parser = AsmParser::new();
    let program = parser.parse_program(source).expect("parse");
    assert_eq!(program.len(), 4);
    assert_eq!(program[1].pc, 1);
    assert_eq!(parser.label_pc("loop"), Some(1));
    assert_eq!(parser.label_pc("end"), Some(3));
    assert_eq!(parser.label_pc("missing"), None);
}

#[test]
fn test_mnemonics_are_case_insensitive() {
    let mut parser = AsmParser::new();
    let program = parser.parse_program("addi r1, r0, 3\nadd R2, r1, R1").expect("parse");
    assert_eq!(program.len(), 2);
    assert_eq!(program[1].op.mnemonic(), "ADD");
}

#[test]
fn test_malformed_line_reports_line_number() {
    let mut parser = AsmParser::new();
    let result = parser.parse_program("ADDI R1, R0, 1\nADD R1, R2\nNOP");
    match result {
        Err(SimulatorError::ParseError(line, _)) => assert_eq!(line, 2),
        other => panic!("expected a parse error, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_unknown_instruction_is_rejected() {
    let mut parser = AsmParser::new();
    assert!(parser.parse_program("FOO R1, R2, R3").is_err());
}

#[test]
fn test_register_out_of_range_is_rejected() {
    let mut parser = AsmParser::new();
    assert!(parser.parse_program("ADDI R32, R0, 1").is_err());
    assert!(parser.parse_program("ADDI RX, R0, 1").is_err());
}
