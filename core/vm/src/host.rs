// meridian/core/vm/src/host.rs

// Host interface handed to VMs: state access, call frames, metering and
// nested calls
use crate::context::CallFrame;
use crate::costs;
use crate::error::VmError;
use crate::monitor::Monitor;
use meridian_state::Visitor;
use meridian_types::{Action, Cost};
use std::time::Instant;
use tracing::debug;

pub struct Host<'a> {
    visitor: &'a mut Visitor,
    monitor: &'a Monitor,
    base: CallFrame,
    frames: Vec<CallFrame>,
    call_path: Vec<String>,
    deadline: Instant,
    gas_limit: u64,
    cost: Cost,
}

impl<'a> Host<'a> {
    pub fn new(
        visitor: &'a mut Visitor,
        monitor: &'a Monitor,
        frame: CallFrame,
        deadline: Instant,
        gas_limit: u64,
    ) -> Self {
        Self {
            visitor,
            monitor,
            base: frame,
            frames: Vec::new(),
            call_path: Vec::new(),
            deadline,
            gas_limit,
            cost: Cost::zero(),
        }
    }

    pub fn visitor(&mut self) -> &mut Visitor {
        self.visitor
    }

    pub fn monitor(&self) -> &'a Monitor {
        self.monitor
    }

    /// Innermost call frame.
    pub fn frame(&self) -> &CallFrame {
        self.frames.last().unwrap_or(&self.base)
    }

    pub fn frame_mut(&mut self) -> &mut CallFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.base,
        }
    }

    /// Push a copy of the innermost frame.
    pub fn push_frame(&mut self) {
        let frame = self.frame().clone();
        self.frames.push(frame);
    }

    /// Pop the innermost frame. The root frame is never popped.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn check_deadline(&self) -> Result<(), VmError> {
        if Instant::now() >= self.deadline {
            return Err(VmError::Timeout);
        }
        Ok(())
    }

    /// Accumulated cost of everything run on this host.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn gas_used(&self) -> u64 {
        self.cost.to_gas()
    }

    /// Meter `cost`, failing once the gas limit is exceeded.
    pub fn charge(&mut self, cost: Cost) -> Result<(), VmError> {
        self.cost += cost;
        if self.cost.to_gas() > self.gas_limit {
            return Err(VmError::GasRunOut {
                limit: self.gas_limit,
            });
        }
        Ok(())
    }

    /// Run one transaction action as the outermost call.
    pub fn call_action(&mut self, action: &Action) -> Result<Vec<String>, VmError> {
        self.check_deadline()?;
        self.enter(&action.contract, &action.action_name, &action.data)
    }

    /// Nested inter-contract call from inside a running contract.
    pub fn call(&mut self, contract: &str, api: &str, args: &str) -> Result<Vec<String>, VmError> {
        self.check_deadline()?;
        self.charge(costs::NESTED_CALL)?;
        self.enter(contract, api, args)
    }

    /// Record `contract-api` on the call path for the duration of the call.
    /// The monitor owns the frame of the call.
    fn enter(&mut self, contract: &str, api: &str, args: &str) -> Result<Vec<String>, VmError> {
        let record = format!("{}-{}", contract, api);
        if self.call_path.contains(&record) {
            debug!("Rejecting reentrant call {} at depth {}", record, self.depth());
            return Err(VmError::Reentrance(record));
        }

        self.call_path.push(record);
        let monitor = self.monitor;
        let result = monitor.call(self, contract, api, args);
        self.call_path.pop();
        result
    }
}
