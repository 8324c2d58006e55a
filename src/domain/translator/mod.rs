//! Compiles node trees into reactive graphs.
//!
//! Each node is translated once per context. A node with a concrete type
//! gets a proxy while its children compile, so a reference cycling back to
//! it receives the proxy instead of recursing; the proxy is bound to the
//! finished translation before the node is memoized.

mod functions;
mod market;
mod orders;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::domain::context::{node_key, CompilationContext, NodeKey};
use crate::domain::error::{CompileError, Fault};
use crate::domain::node::{FoldOperand, Node, NodeKind};
use crate::domain::reactor::{
    aggregate, chain, constant, count, distinct, filter, first, fold, fold_argument, last, lift,
    lift2, none, previous, range, throw, until, when, FoldSlot, Series,
};
use crate::domain::signatures::{self, Signature};
use crate::domain::translation::{with_native_type, Translation};
use crate::domain::types::{CanvasType, NativeType};
use crate::domain::value::{NativeValue, Quantity, Record, Value};

use functions::Arguments;

/// Compiles `root`, reusing whatever `context` already memoized.
pub fn translate<'a>(
    context: &mut CompilationContext<'a>,
    root: &'a Node,
) -> Result<Translation, CompileError> {
    let mut translator = Translator {
        context,
        root,
        in_progress: HashSet::new(),
    };
    translator.translate(root)
}

struct Translator<'a, 'c> {
    context: &'c mut CompilationContext<'a>,
    root: &'a Node,
    /// Polymorphic nodes currently compiling; they cannot be proxied.
    in_progress: HashSet<NodeKey>,
}

impl<'a> Translator<'a, '_> {
    fn translate(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let key = node_key(node);
        if let Some(translation) = self.context.memo(key) {
            trace!(node = node.label(), "memo hit");
            return Ok(translation);
        }
        if let Some(proxy) = self.context.pending_proxy(key) {
            debug!(node = node.label(), "cycle closed through proxy");
            return Ok(proxy);
        }
        let declared = node.node_type().native_type();
        match declared {
            Some(native) => self.context.install_proxy(key, native),
            None => {
                if !self.in_progress.insert(key) {
                    return Err(CompileError::InvalidNode {
                        node: node.label().to_string(),
                        reason: "cycle through a node without a concrete type".into(),
                    });
                }
            }
        }

        let result = self.visit(node).and_then(|translation| match declared {
            Some(native) => translation.coerce(native),
            None => Ok(translation),
        });
        self.in_progress.remove(&key);
        let pending = self.context.take_proxy(key);
        let translation = result?;
        if let Some(pending) = pending {
            pending.bind(&translation)?;
        }
        self.context.memoize(key, translation.clone());
        Ok(translation)
    }

    fn visit(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        match node.kind() {
            NodeKind::Value(value) => Ok(Translation::constant(value.clone())),
            NodeKind::None => {
                let native = concrete(node)?;
                Ok(with_native_type!(native, T => Translation::new(none::<T>())))
            }
            NodeKind::Abs
            | NodeKind::Addition
            | NodeKind::Subtraction
            | NodeKind::Multiplication
            | NodeKind::Division
            | NodeKind::Max
            | NodeKind::Min
            | NodeKind::Floor
            | NodeKind::Ceil
            | NodeKind::Round
            | NodeKind::Not
            | NodeKind::Equals
            | NodeKind::Unequal
            | NodeKind::Greater
            | NodeKind::GreaterOrEquals
            | NodeKind::Lesser
            | NodeKind::LesserOrEquals
            | NodeKind::If
            | NodeKind::IsTerminal => {
                let (signature, arguments) = self.resolve(node)?;
                functions::instantiate(node.kind(), &signature, &arguments)
            }
            NodeKind::Chain | NodeKind::Aggregate => self.sequence(node),
            NodeKind::When | NodeKind::Until | NodeKind::Filter => self.gate(node),
            NodeKind::Distinct
            | NodeKind::Count
            | NodeKind::First
            | NodeKind::Last
            | NodeKind::Previous => self.transform(node),
            NodeKind::Fold => self.fold(node),
            NodeKind::FoldOperand(_) => self.fold_operand(node),
            NodeKind::Range => {
                let (_, arguments) = self.resolve(node)?;
                let arguments = Arguments {
                    kind: node.kind(),
                    translations: &arguments,
                };
                Ok(Translation::new(range(
                    arguments.get::<Quantity>(0)?,
                    arguments.get::<Quantity>(1)?,
                    self.context.trigger(),
                )))
            }
            NodeKind::CurrentDateTime | NodeKind::CurrentDate | NodeKind::CurrentTime => {
                Ok(self.current_time(node.kind()))
            }
            NodeKind::Timer => self.timer(node),
            NodeKind::Alarm => self.alarm(node),
            NodeKind::TimeAndSaleQuery => self.time_and_sales(node),
            NodeKind::BboQuoteQuery => self.bbo_quotes(node),
            NodeKind::OrderImbalanceQuery => self.order_imbalances(node),
            NodeKind::Record => self.record(node),
            NodeKind::Query { field } => self.query(node, field),
            NodeKind::SingleOrder => self.single_order(node),
            NodeKind::OrderWrapper(order) => Ok(self.order_wrapper(node, order)),
            NodeKind::ExecutionReportMonitor => self.execution_reports(node),
            NodeKind::Spawn => self.spawn(node),
            NodeKind::Reference { .. } => self.reference(node),
            NodeKind::Script { path } => self.script(node, path),
        }
    }

    fn translate_children(&mut self, node: &'a Node) -> Result<Vec<Translation>, CompileError> {
        node.children()
            .iter()
            .map(|child| self.translate(child))
            .collect()
    }

    /// Compiles the children, selects the signature for their types and
    /// widens each child to its parameter type.
    fn resolve(
        &mut self,
        node: &'a Node,
    ) -> Result<(Signature, Vec<Translation>), CompileError> {
        let translations = self.translate_children(node)?;
        let arguments: Vec<CanvasType> = node
            .children()
            .iter()
            .zip(&translations)
            .map(|(child, translation)| argument_type(child, translation))
            .collect();
        let table = signatures::signatures(node.kind());
        let signature = signatures::resolve(
            node.kind().name(),
            &table,
            &arguments,
            Some(node.node_type()),
        )?
        .clone();
        debug!(node = node.label(), %signature, "signature selected");
        let translations = translations
            .iter()
            .enumerate()
            .map(|(i, translation)| {
                match signature.param(i).and_then(CanvasType::native_type) {
                    Some(native) => translation.coerce(native),
                    None => Ok(translation.clone()),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((signature, translations))
    }

    fn sequence(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (signature, translations) = self.resolve(node)?;
        let native = returned(node, &signature)?;
        let trigger = self.context.trigger().clone();
        let members = node
            .children()
            .iter()
            .zip(translations)
            .filter(|(child, _)| *child.kind() != NodeKind::None)
            .map(|(_, translation)| translation);
        with_native_type!(native, T => {
            let mut members = members
                .map(|translation| translation.extract::<T>())
                .collect::<Result<Vec<_>, _>>()?;
            let series = if *node.kind() == NodeKind::Aggregate {
                aggregate(members, &trigger)
            } else {
                match members.pop() {
                    None => none::<T>(),
                    Some(last) => members
                        .into_iter()
                        .rev()
                        .fold(last, |rest, head| chain(head, rest, &trigger)),
                }
            };
            Ok(Translation::new(series))
        })
    }

    fn gate(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (signature, translations) = self.resolve(node)?;
        let native = returned(node, &signature)?;
        let arguments = Arguments {
            kind: node.kind(),
            translations: &translations,
        };
        let condition = arguments.get::<bool>(0)?;
        if *node.kind() == NodeKind::Until && native == NativeType::Order {
            return Ok(self.cancellable_until(condition, arguments.get(1)?));
        }
        with_native_type!(native, T => {
            let series = arguments.get::<T>(1)?;
            Ok(Translation::new(match node.kind() {
                NodeKind::When => when(condition, series),
                NodeKind::Until => until(condition, series),
                _ => filter(condition, series),
            }))
        })
    }

    fn transform(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (signature, translations) = self.resolve(node)?;
        let native = signature
            .param(0)
            .and_then(CanvasType::native_type)
            .ok_or_else(|| not_concrete(node))?;
        let arguments = Arguments {
            kind: node.kind(),
            translations: &translations,
        };
        with_native_type!(native, T => {
            let source = arguments.get::<T>(0)?;
            Ok(match node.kind() {
                NodeKind::Distinct => Translation::new(distinct(source)),
                NodeKind::Count => Translation::new(count(source)),
                NodeKind::First => Translation::new(first(source)),
                NodeKind::Last => Translation::new(last(source)),
                _ => Translation::new(previous(source)),
            })
        })
    }

    fn fold(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (signature, translations) = self.resolve(node)?;
        let native = returned(node, &signature)?;
        let combiner = node.children().first().ok_or_else(|| CompileError::MissingChild {
            kind: node.kind().name().to_string(),
            slot: "combiner".into(),
        })?;
        let operand = |side: FoldOperand| {
            combiner
                .find_fold_operand(side)
                .ok_or_else(|| CompileError::InvalidNode {
                    node: node.label().to_string(),
                    reason: format!("combiner has no {side:?} operand"),
                })
        };
        let (left, right) = (operand(FoldOperand::Left)?, operand(FoldOperand::Right)?);
        let arguments = Arguments {
            kind: node.kind(),
            translations: &translations,
        };
        with_native_type!(native, T => {
            Ok(Translation::new(fold(
                arguments.get::<T>(0)?,
                self.fold_slot::<T>(left)?,
                self.fold_slot::<T>(right)?,
                arguments.get::<T>(1)?,
            )))
        })
    }

    fn fold_slot<T: NativeValue>(&self, operand: &Node) -> Result<Rc<FoldSlot<T>>, CompileError> {
        self.context
            .fold_slot::<T>(node_key(operand))
            .ok_or_else(|| CompileError::TypeMismatch {
                expected: T::NATIVE.name().to_string(),
                found: operand.node_type().to_string(),
            })
    }

    fn fold_operand(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let native = concrete(node)?;
        let key = node_key(node);
        Ok(with_native_type!(native, T => {
            let (slot, series) = fold_argument::<T>();
            self.context.register_fold_slot(key, slot);
            Translation::new(series)
        }))
    }

    fn record(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let values = self
            .translate_children(node)?
            .iter()
            .map(Translation::to_values)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Translation::new(lift(
            |fields: Vec<Value>| Ok(Record::new(fields)),
            gather(values),
        )))
    }

    fn query(&mut self, node: &'a Node, field: &str) -> Result<Translation, CompileError> {
        let source = node.children().first().ok_or_else(|| CompileError::MissingChild {
            kind: node.kind().name().to_string(),
            slot: "record".into(),
        })?;
        let index = source
            .node_type()
            .as_record()
            .and_then(|layout| layout.field_index(field))
            .ok_or_else(|| CompileError::InvalidNode {
                node: node.label().to_string(),
                reason: format!("{} has no field '{field}'", source.node_type()),
            })?;
        let native = concrete(node)?;
        let records = self.translate(source)?.extract::<Record>()?;
        Ok(with_native_type!(native, T => Translation::new(lift(
            move |record: Record| field_value::<T>(&record, index),
            records,
        ))))
    }

    /// Follows reference chains to their target. A chain leading back to
    /// itself compiles to an empty series.
    fn reference(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let mut target = node;
        let mut visited = vec![node_key(node)];
        while let NodeKind::Reference { path } = target.kind() {
            target = self.root.resolve(path)?;
            if visited.contains(&node_key(target)) {
                debug!(path = path.as_str(), "reference resolves to itself");
                let native = concrete(node)?;
                return Ok(with_native_type!(native, T => Translation::new(none::<T>())));
            }
            visited.push(node_key(target));
        }
        self.translate(target)
    }

    fn script(&mut self, node: &'a Node, path: &Path) -> Result<Translation, CompileError> {
        let native = concrete(node)?;
        let loaded = match self.context.scripts() {
            Some(host) => host.load(path),
            None => Err(format!("no script host to load {}", path.display())),
        };
        let script = match loaded {
            Ok(script) => Rc::new(RefCell::new(script)),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "script failed to load");
                return Ok(faulted(native, Fault::ScriptLoadFailure(reason)));
            }
        };
        let parameters = self
            .translate_children(node)?
            .iter()
            .map(Translation::to_values)
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = gather(parameters);
        Ok(with_native_type!(native, T => Translation::new(lift(
            move |parameters: Vec<Value>| {
                let value = script
                    .borrow_mut()
                    .call(&parameters)
                    .map_err(Fault::ScriptFailure)?;
                convert::<T>(value)
            },
            parameters,
        ))))
    }
}

/// The type a child contributes to signature resolution. Concrete declared
/// types keep record layouts; otherwise the runtime type decides.
fn argument_type(child: &Node, translation: &Translation) -> CanvasType {
    if child.node_type().native_type() == Some(translation.native_type()) {
        child.node_type().clone()
    } else {
        CanvasType::from_native(translation.native_type())
    }
}

fn not_concrete(node: &Node) -> CompileError {
    CompileError::InvalidNode {
        node: node.label().to_string(),
        reason: format!("{} is not a concrete type", node.node_type()),
    }
}

fn concrete(node: &Node) -> Result<NativeType, CompileError> {
    node.node_type()
        .native_type()
        .ok_or_else(|| not_concrete(node))
}

fn returned(node: &Node, signature: &Signature) -> Result<NativeType, CompileError> {
    match signature.ret.native_type() {
        Some(native) => Ok(native),
        None => concrete(node),
    }
}

fn faulted(native: NativeType, fault: Fault) -> Translation {
    with_native_type!(native, T => Translation::new(throw::<T>(fault)))
}

/// Collects the latest value of every series, evaluating whenever any of
/// them does once all have values.
fn gather(values: Vec<Series<Value>>) -> Series<Vec<Value>> {
    let mut values = values.into_iter();
    let Some(head) = values.next() else {
        return constant(Vec::new());
    };
    values.fold(lift(|v: Value| Ok(vec![v]), head), |collected, next| {
        lift2(
            |mut collected: Vec<Value>, v: Value| {
                collected.push(v);
                Ok(collected)
            },
            collected,
            next,
        )
    })
}

fn convert<T: NativeValue>(value: Value) -> Result<T, Fault> {
    let found = value.native_type();
    T::from_value(value).ok_or_else(|| Fault::TypeMismatch {
        expected: T::NATIVE.name().to_string(),
        found: found.name().to_string(),
    })
}

fn field_value<T: NativeValue>(record: &Record, index: usize) -> Result<T, Fault> {
    let value = record.get(index).cloned().ok_or_else(|| Fault::TypeMismatch {
        expected: T::NATIVE.name().to_string(),
        found: format!("record without field {index}"),
    })?;
    convert(value)
}
