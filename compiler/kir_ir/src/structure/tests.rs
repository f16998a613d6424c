use std::convert::Infallible;

use pretty_assertions::assert_eq;

use super::*;

/// Records every callback as a short event string.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl StructuredSink for Recorder {
    type Error = Infallible;

    fn start_block(&mut self, block: &Block) -> Result<(), Infallible> {
        self.events.push(format!("start {}", block.label));
        Ok(())
    }
    fn finish_block(&mut self, block: &Block) -> Result<(), Infallible> {
        self.events.push(format!("finish {}", block.label));
        Ok(())
    }
    fn write_effect(&mut self, node: NodeId) -> Result<(), Infallible> {
        self.events.push(format!("effect {}", node.raw()));
        Ok(())
    }
    fn write_return(&mut self, node: NodeId) -> Result<(), Infallible> {
        self.events.push(format!("return {}", node.raw()));
        Ok(())
    }
    fn start_if(&mut self, node: NodeId) -> Result<(), Infallible> {
        self.events.push(format!("if {}", node.raw()));
        Ok(())
    }
    fn start_else(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.events.push("else".to_owned());
        Ok(())
    }
    fn finish_if(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.events.push("endif".to_owned());
        Ok(())
    }
    fn start_switch(&mut self, node: NodeId) -> Result<(), Infallible> {
        self.events.push(format!("switch {}", node.raw()));
        Ok(())
    }
    fn start_case(&mut self, _node: NodeId, key: Option<i32>) -> Result<(), Infallible> {
        self.events.push(match key {
            Some(key) => format!("case {key}"),
            None => "default".to_owned(),
        });
        Ok(())
    }
    fn finish_case(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.events.push("endcase".to_owned());
        Ok(())
    }
    fn finish_switch(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.events.push("endswitch".to_owned());
        Ok(())
    }
    fn write_break_to(&mut self, from: NodeId, label: &Label) -> Result<(), Infallible> {
        self.events.push(format!("break {label} from {}", from.raw()));
        Ok(())
    }
    fn write_continue_to(&mut self, from: NodeId, label: &Label) -> Result<(), Infallible> {
        self.events.push(format!("continue {label} from {}", from.raw()));
        Ok(())
    }
    fn write_edge(&mut self, from: NodeId) -> Result<(), Infallible> {
        self.events.push(format!("edge {}", from.raw()));
        Ok(())
    }
}

fn n(raw: u32) -> NodeId {
    NodeId::new(raw)
}

fn replay(body: &[Stmt]) -> Vec<String> {
    let mut recorder = Recorder::default();
    if let Err(never) = sequence(body, &mut recorder) {
        match never {}
    }
    recorder.events
}

#[test]
fn nested_blocks_replay_in_source_order() {
    let body = vec![Stmt::Block {
        block: Block::looping("L1"),
        body: vec![
            Stmt::Effect(n(3)),
            Stmt::If {
                node: n(4),
                then_body: vec![Stmt::Break {
                    from: n(5),
                    label: Label::new("L1"),
                }],
                else_body: vec![Stmt::Continue {
                    from: n(6),
                    label: Label::new("L1"),
                }],
            },
        ],
    }];

    assert_eq!(
        replay(&body),
        vec![
            "start L1",
            "effect 3",
            "if 4",
            "break L1 from 5",
            "else",
            "continue L1 from 6",
            "endif",
            "finish L1",
        ]
    );
}

#[test]
fn switch_replays_cases_then_default() {
    let body = vec![
        Stmt::Switch {
            node: n(1),
            arms: vec![
                SwitchArm {
                    key: 1,
                    body: vec![Stmt::Effect(n(2))],
                },
                SwitchArm {
                    key: 7,
                    body: vec![],
                },
            ],
            default: vec![Stmt::Edge { from: n(3) }],
        },
        Stmt::Return(n(9)),
    ];

    assert_eq!(
        replay(&body),
        vec![
            "switch 1",
            "case 1",
            "effect 2",
            "endcase",
            "case 7",
            "endcase",
            "default",
            "edge 3",
            "endcase",
            "endswitch",
            "return 9",
        ]
    );
}

#[test]
fn deep_nesting_does_not_recurse() {
    let mut body = vec![Stmt::Effect(n(0))];
    for depth in 0..1_000 {
        body = vec![Stmt::Block {
            block: Block::sequence(&format!("B{depth}")),
            body,
        }];
    }
    let events = replay(&body);
    assert_eq!(events.len(), 2_001);
    assert_eq!(events[0], "start B999");
    assert_eq!(events[1_000], "effect 0");
}
