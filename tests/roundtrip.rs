//! End-to-end scenarios: build with the public API, encode, decode, and
//! check the decoded graph against the one that went in.

use bingraph::builder::{Branch, ExprNode, GraphBuilder};
use bingraph::codec::wire;
use bingraph::core::annotation::CommentKind;
use bingraph::core::call_graph::{Vertex, VertexKind};
use bingraph::core::flow_graph::FlowEdgeKind;
use bingraph::core::section::{Library, Module, Section};
use bingraph::{decode, encode, BinGraphError, Table};
use prost::Message;

/// One `mov eax, 1`, one block, one flow graph, one vertex.
fn minimal_function() -> bingraph::BinaryGraph {
    let mut builder = GraphBuilder::new();

    let mut operand = builder.operand();
    operand.root(ExprNode::register("eax")).unwrap();
    let dst = operand.finish().unwrap();
    let mut operand = builder.operand();
    operand.root(ExprNode::immediate_int(1)).unwrap();
    let src = operand.finish().unwrap();

    let insn = builder
        .add_instruction(
            0x1000,
            "mov",
            vec![dst, src],
            vec![0xb8, 0x01, 0x00, 0x00, 0x00],
            Vec::new(),
        )
        .unwrap();
    let block = builder.add_basic_block(&[insn]).unwrap();
    builder.add_flow_graph(0x1000, &[block], &[]).unwrap();
    builder
        .add_vertex(Vertex::new(0x1000, VertexKind::Normal))
        .unwrap();
    builder.finish().unwrap()
}

#[test]
fn minimal_function_round_trips_exactly() {
    let graph = minimal_function();
    let bytes = encode(&graph).unwrap();
    let back = decode(&bytes).unwrap();
    assert_eq!(graph, back);

    assert_eq!(back.instruction.len(), 1);
    assert_eq!(back.instruction[0].address, Some(0x1000));
    assert_eq!(back.instruction[0].mnemonic_index, 0);
    assert_eq!(back.mnemonic[0].name, "mov");
    assert_eq!(back.instruction_mnemonic(0), Some("mov"));
    assert_eq!(
        back.instruction[0].raw_bytes,
        vec![0xb8, 0x01, 0x00, 0x00, 0x00]
    );
    assert_eq!(back.flow_graph.len(), 1);
    assert!(back.flow_graph[0].edges.is_empty());
    assert_eq!(back.call_graph.vertex_count(), 1);
    assert_eq!(back.call_graph.vertex[0].address, 0x1000);
    assert_eq!(back.call_graph.vertex[0].kind, VertexKind::Normal);
    assert!(back.call_graph.edge.is_empty());
}

#[test]
fn shared_epilogue_block_is_stored_once() {
    let mut builder = GraphBuilder::new();

    let jmp_a = builder
        .add_instruction(0x1000, "jmp", Vec::new(), vec![0xe9, 0xfb, 0x0f, 0x00, 0x00], Vec::new())
        .unwrap();
    let jmp_b = builder
        .add_instruction(0x1800, "jmp", Vec::new(), vec![0xe9, 0xfb, 0x07, 0x00, 0x00], Vec::new())
        .unwrap();
    let pop = builder
        .add_instruction(0x2000, "pop", Vec::new(), vec![0x5d], Vec::new())
        .unwrap();
    let ret = builder
        .add_instruction(0x2001, "ret", Vec::new(), vec![0xc3], Vec::new())
        .unwrap();

    let block_a = builder.add_basic_block(&[jmp_a]).unwrap();
    let block_b = builder.add_basic_block(&[jmp_b]).unwrap();
    let epilogue_from_a = builder.add_basic_block(&[pop, ret]).unwrap();
    let epilogue_from_b = builder.add_basic_block(&[pop, ret]).unwrap();
    assert_eq!(epilogue_from_a, epilogue_from_b);

    builder
        .add_flow_graph(
            0x1000,
            &[block_a, epilogue_from_a],
            &[Branch::new(block_a, epilogue_from_a, FlowEdgeKind::Unconditional)],
        )
        .unwrap();
    builder
        .add_flow_graph(
            0x1800,
            &[block_b, epilogue_from_b],
            &[Branch::new(block_b, epilogue_from_b, FlowEdgeKind::Unconditional)],
        )
        .unwrap();
    builder
        .add_vertex(Vertex::new(0x1000, VertexKind::Normal))
        .unwrap();
    builder
        .add_vertex(Vertex::new(0x1800, VertexKind::Normal))
        .unwrap();

    let graph = builder.finish().unwrap();
    let back = decode(&encode(&graph).unwrap()).unwrap();

    // Three distinct blocks despite four insertions.
    assert_eq!(back.basic_block.len(), 3);
    let shared = epilogue_from_a;
    assert!(back.flow_graph[0].basic_block_index.contains(&shared));
    assert!(back.flow_graph[1].basic_block_index.contains(&shared));
    assert_eq!(
        back.basic_block[shared as usize]
            .instructions()
            .collect::<Vec<_>>(),
        vec![pop, ret]
    );
}

#[test]
fn corrupted_operand_index_is_rejected_naming_the_operand_table() {
    // Craft the corruption at the wire layer; the builder would never emit it.
    let mut raw = wire::BinaryGraph::default();
    for _ in 0..10 {
        raw.expression.push(wire::Expression {
            r#type: Some(wire::ExpressionType::Register as i32),
            symbol: Some("eax".to_string()),
            ..Default::default()
        });
    }
    raw.operand.push(wire::Operand {
        expression_index: vec![999],
    });
    let bytes = raw.encode_length_delimited_to_vec();

    let err = decode(&bytes).unwrap_err();
    match err {
        BinGraphError::DataIntegrity {
            table,
            index,
            field,
            reason,
        } => {
            assert_eq!(table, Table::Operand);
            assert_eq!(index, 0);
            assert_eq!(field, "expression_index");
            assert!(reason.contains("999"), "reason: {reason}");
        }
        other => panic!("expected DataIntegrity, got {other:?}"),
    }
}

#[test]
fn unsorted_vertices_are_rejected_as_ordering_violation() {
    let mut raw = wire::BinaryGraph::default();
    raw.call_graph = Some(wire::CallGraph {
        vertex: vec![
            wire::Vertex {
                address: Some(0x2000),
                ..Default::default()
            },
            wire::Vertex {
                address: Some(0x1000),
                ..Default::default()
            },
        ],
        edge: Vec::new(),
    });
    let bytes = raw.encode_length_delimited_to_vec();
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, BinGraphError::OrderingViolation { index: 1 }));
}

#[test]
fn missing_first_address_is_rejected() {
    let mut raw = wire::BinaryGraph::default();
    raw.mnemonic.push(wire::Mnemonic {
        name: Some("nop".to_string()),
    });
    raw.instruction.push(wire::Instruction {
        address: None,
        raw_bytes: Some(vec![0x90]),
        ..Default::default()
    });
    let bytes = raw.encode_length_delimited_to_vec();
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        BinGraphError::DataIntegrity {
            table: Table::Instruction,
            index: 0,
            field: "address",
            ..
        }
    ));
}

#[test]
fn three_block_loop_marks_exactly_the_retreating_edge() {
    let mut builder = GraphBuilder::new();
    let a = builder
        .add_instruction(0x1000, "nop", Vec::new(), vec![0x90], Vec::new())
        .unwrap();
    let b = builder
        .add_instruction(0x1010, "nop", Vec::new(), vec![0x90], Vec::new())
        .unwrap();
    let c = builder
        .add_instruction(0x1020, "ret", Vec::new(), vec![0xc3], Vec::new())
        .unwrap();
    let block_a = builder.add_basic_block(&[a]).unwrap();
    let block_b = builder.add_basic_block(&[b]).unwrap();
    let block_c = builder.add_basic_block(&[c]).unwrap();
    builder
        .add_flow_graph(
            0x1000,
            &[block_a, block_b, block_c],
            &[
                Branch::new(block_a, block_b, FlowEdgeKind::Unconditional),
                Branch::new(block_b, block_a, FlowEdgeKind::ConditionTrue),
                Branch::new(block_b, block_c, FlowEdgeKind::ConditionFalse),
            ],
        )
        .unwrap();

    let graph = builder.finish().unwrap();
    let back = decode(&encode(&graph).unwrap()).unwrap();
    let flow = &back.flow_graph[0];
    let marked: Vec<(u32, u32)> = flow
        .back_edges()
        .map(|edge| (edge.source, edge.target))
        .collect();
    assert_eq!(marked, vec![(1, 0)]);
    assert_eq!(flow.edges.iter().filter(|e| e.is_back_edge).count(), 1);
}

#[test]
fn annotated_graph_round_trips_with_all_tables_populated() {
    let mut builder = GraphBuilder::new();
    builder.seed_mnemonics(["mov", "push", "call"]).unwrap();
    let meta = builder.meta_mut();
    meta.executable_name = Some("sample.exe".to_string());
    meta.executable_id = Some("a3f1".repeat(16));
    meta.architecture_name = Some("x86-64".to_string());
    meta.timestamp = Some(1_754_000_000);

    let library = builder
        .add_library(Library {
            name: "kernel32.dll".to_string(),
            is_static: false,
            load_address: None,
        })
        .unwrap();
    let module = builder
        .add_module(Module {
            name: "Sample::Main".to_string(),
        })
        .unwrap();
    builder.add_section(Section::new(0x1000, 0x2000, true, false, true));

    let mut operand = builder.operand();
    let deref = operand.root(ExprNode::dereference()).unwrap();
    let plus = operand.child(deref, ExprNode::operator("+")).unwrap();
    operand.child(plus, ExprNode::register("rbx")).unwrap();
    operand
        .child(plus, ExprNode::immediate_int(0x20).relocated())
        .unwrap();
    let mem = operand.finish().unwrap();

    let insn = builder
        .add_instruction(
            0x1000,
            "mov",
            vec![mem],
            vec![0x48, 0x8b, 0x43, 0x20],
            vec![0x4000],
        )
        .unwrap();
    let callee_insn = builder
        .add_instruction(0x4000, "push", Vec::new(), vec![0x55], Vec::new())
        .unwrap();

    builder
        .add_comment(insn, 0, 1, "field load", CommentKind::Anterior, true)
        .unwrap();
    builder
        .add_string_reference(insn, 0, 0, "GetProcAddress")
        .unwrap();
    builder
        .add_expression_substitution(insn, 0, 3, "this->offset")
        .unwrap();
    builder.add_data_reference(insn, 0x5000).unwrap();
    builder.add_md_index("producer/version", vec![1, 2, 3]);
    // Orphan string-table entries are legal; nothing has to reference them.
    builder.intern_string("build-id: 7f3a").unwrap();
    assert_eq!(builder.instruction_count(), 2);

    let caller_block = builder.add_basic_block(&[insn]).unwrap();
    let callee_block = builder.add_basic_block(&[callee_insn]).unwrap();
    builder.add_flow_graph(0x1000, &[caller_block], &[]).unwrap();
    builder
        .add_flow_graph(0x4000, &[callee_block], &[])
        .unwrap();

    builder
        .add_vertex(
            Vertex::new(0x4000, VertexKind::Imported)
                .with_mangled_name("_Zcallee")
                .with_demangled_name("callee()"),
        )
        .unwrap();
    builder
        .add_vertex(Vertex::new(0x1000, VertexKind::Normal))
        .unwrap();
    builder.add_call(0x1000, 0x4000).unwrap();

    let mut graph = builder.finish().unwrap();
    graph.call_graph.vertex[1].library_index = Some(library);
    graph.call_graph.vertex[1].module_index = Some(module);

    let bytes = encode(&graph).unwrap();
    let back = decode(&bytes).unwrap();
    assert_eq!(graph, back);

    // Vertices came out address-sorted with resolved edges.
    assert_eq!(back.call_graph.vertex[0].address, 0x1000);
    assert_eq!(back.call_graph.vertex[1].address, 0x4000);
    assert_eq!(back.call_graph.edge.len(), 1);
    assert_eq!(back.call_graph.edge[0].source_vertex_index, 0);
    assert_eq!(back.call_graph.edge[0].target_vertex_index, 1);

    // Annotations survived with their interned text.
    let comment = &back.comment[0];
    assert_eq!(comment.kind, CommentKind::Anterior);
    assert!(comment.repeatable);
    assert_eq!(
        back.string_table[comment.string_table_index as usize],
        "field load"
    );
    assert_eq!(back.md_index[0].key, "producer/version");
    assert_eq!(back.md_index[0].payload, vec![1, 2, 3]);
    assert_eq!(back.instruction[insn as usize].comment_index, vec![0]);
}

#[test]
fn second_encode_of_decoded_graph_is_byte_identical() -> anyhow::Result<()> {
    let graph = minimal_function();
    let bytes = encode(&graph)?;
    let again = encode(&decode(&bytes)?)?;
    assert_eq!(bytes, again);
    Ok(())
}
