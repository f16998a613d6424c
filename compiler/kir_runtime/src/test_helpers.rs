//! Kernels shared by runtime tests. Only compiled in test builds.

use std::sync::Arc;

use kir_driver::testing::{LaunchArg, ScriptedDriver};
use kir_ir::{
    BinaryOp, ClassName, Graph, Invocation, InvokeKind, KernelClass, KernelType, MethodGraph,
    Stmt, ENTRY_METHOD, WORK_ITEM_CLASS,
};

use crate::error::KernelFault;
use crate::kernel::{Kernel, WorkItem};
use crate::memory::{Binding, SharedArray};

/// Records which work-items ran and the launch size each one saw.
pub(crate) struct Recorder {
    pub hits: SharedArray<i32>,
    pub sizes: SharedArray<i64>,
    fail: Vec<usize>,
    panic_on: Option<usize>,
}

impl Recorder {
    pub fn new(n: usize) -> Self {
        Recorder {
            hits: SharedArray::new(n),
            sizes: SharedArray::new(n),
            fail: Vec::new(),
            panic_on: None,
        }
    }

    /// Items in `fail` return a fault after recording themselves.
    pub fn failing(n: usize, fail: &[usize]) -> Self {
        Recorder {
            fail: fail.to_vec(),
            ..Recorder::new(n)
        }
    }

    pub fn panicking(n: usize, id: usize) -> Self {
        Recorder {
            panic_on: Some(id),
            ..Recorder::new(n)
        }
    }
}

impl Kernel for Recorder {
    fn process_work_item(&self, item: &WorkItem) -> Result<(), KernelFault> {
        let id = item.id();
        if self.panic_on == Some(id) {
            panic!("boom at {id}");
        }
        self.hits.set(id, self.hits.get(id) + 1);
        self.sizes.set(id, i64::try_from(item.size()).unwrap_or(-1));
        if self.fail.contains(&id) {
            return Err(KernelFault::new(format!("item {id} failed")));
        }
        Ok(())
    }
}

/// Both handles to one kernel: typed for assertions, erased for contexts.
pub(crate) fn share<K: Kernel + 'static>(kernel: K) -> (Arc<K>, Arc<dyn Kernel>) {
    let typed = Arc::new(kernel);
    let erased: Arc<dyn Kernel> = typed.clone();
    (typed, erased)
}

pub(crate) const SAXPY: &str = "demo.Saxpy";

/// `ys[i] = alpha * xs[i] + ys[i]` with `i = global_id(0)`.
pub(crate) fn saxpy_class() -> KernelClass {
    let kernel = ClassName::new(SAXPY);
    let mut graph = Graph::new();
    let this = graph.this(&kernel);
    let alpha = graph.get_field(this, "alpha", KernelType::Float);
    let xs = graph.get_field(this, "xs", KernelType::array_of(KernelType::Float));
    let ys = graph.get_field(this, "ys", KernelType::array_of(KernelType::Float));
    let dim = graph.int(0);
    let id = graph.invoke(
        Invocation::new(InvokeKind::Static, ClassName::new(WORK_ITEM_CLASS), "global_id"),
        KernelType::Int,
        &[dim],
    );
    let x = graph.array_load(xs, id);
    let y = graph.array_load(ys, id);
    let scaled = graph.binary(BinaryOp::Mul, alpha, x);
    let sum = graph.binary(BinaryOp::Add, scaled, y);
    let store = graph.array_store(ys, id, sum);
    let ret = graph.ret(None);

    KernelClass::new(SAXPY)
        .with_field("alpha", KernelType::Float)
        .with_field("xs", KernelType::array_of(KernelType::Float))
        .with_field("ys", KernelType::array_of(KernelType::Float))
        .with_method(
            MethodGraph::new(ENTRY_METHOD, vec![], KernelType::Void)
                .with_body(graph, vec![Stmt::Effect(store), Stmt::Return(ret)]),
        )
}

pub(crate) struct Saxpy {
    pub alpha: f32,
    pub xs: SharedArray<f32>,
    pub ys: SharedArray<f32>,
    class: KernelClass,
}

impl Saxpy {
    pub fn new(alpha: f32, xs: &[f32], ys: &[f32]) -> Self {
        Saxpy {
            alpha,
            xs: SharedArray::from_slice(xs),
            ys: SharedArray::from_slice(ys),
            class: saxpy_class(),
        }
    }
}

impl Kernel for Saxpy {
    fn process_work_item(&self, item: &WorkItem) -> Result<(), KernelFault> {
        let i = item.global_id(0);
        self.ys.set(i, self.alpha * self.xs.get(i) + self.ys.get(i));
        Ok(())
    }

    fn class(&self) -> Option<&KernelClass> {
        Some(&self.class)
    }

    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::Float(self.alpha),
            Binding::FloatArray(self.xs.clone()),
            Binding::FloatArray(self.ys.clone()),
        ]
    }
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Scripted driver whose device runs saxpy launches.
pub(crate) fn saxpy_device() -> ScriptedDriver {
    let driver = ScriptedDriver::single("Scripted", "gpu0");
    driver.on_launch(|_, global, args: &mut [LaunchArg]| {
        let alpha = floats(args[0].bytes())[0];
        let xs = floats(args[1].bytes());
        let mut ys = floats(args[2].bytes());
        for i in 0..global {
            ys[i] = alpha * xs[i] + ys[i];
        }
        *args[2].bytes_mut() = ys.iter().flat_map(|y| y.to_ne_bytes()).collect();
    });
    driver
}
