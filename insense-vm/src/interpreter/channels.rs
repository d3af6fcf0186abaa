//! `CONNECT`/`DISCONNECT` and the rendezvous opcodes.

use std::sync::Arc;

use tracing::{debug, info};

use super::Interpreter;
use crate::channel::{self, Endpoint};
use crate::component::ComponentHandle;
use crate::error::{Fault, OpResult};
use crate::value::Value;

impl Interpreter {
    /// `CONNECT compVar1 chan1 compVar2 chan2`: waits for both components
    /// to be running, then binds the two endpoints. A direction or element
    /// size mismatch fails the bind and is logged; the component continues.
    pub(super) fn op_connect(&mut self) -> OpResult<()> {
        let (first, first_chan) = self.connect_operand()?;
        let (second, second_chan) = self.connect_operand()?;
        match channel::bind(&first, &second)? {
            true => {
                info!(
                    component = %self.handle.name(),
                    from = %first_chan,
                    to = %second_chan,
                    "channels bound"
                );
            }
            false => {
                debug!(
                    component = %self.handle.name(),
                    from = %first_chan,
                    to = %second_chan,
                    "channels were already bound"
                );
            }
        }
        Ok(())
    }

    /// `DISCONNECT compVar chan`: unbinds the endpoint from all peers.
    pub(super) fn op_disconnect(&mut self) -> OpResult<()> {
        let component = self.component_operand()?;
        let chan = self.reader.expect_string()?;
        let endpoint = component
            .channel(&chan)
            .ok_or_else(|| Fault::UnknownChannel(chan.clone()))?;
        info!(component = %self.handle.name(), channel = %chan, "DISCONNECT");
        channel::unbind(&endpoint);
        Ok(())
    }

    /// `SEND chan`: pops one value and performs a rendezvous send of its
    /// payload. Blocks until a receiver takes it.
    pub(super) fn op_send(&mut self) -> OpResult<()> {
        let chan = self.reader.expect_string()?;
        let endpoint = self
            .handle
            .channel(&chan)
            .ok_or_else(|| Fault::UnknownChannel(chan.clone()))?;
        let value = self.operands.pop()?;
        debug!(component = %self.handle.name(), channel = %chan, ?value, "SEND");
        endpoint.send(value.payload()?);
        Ok(())
    }

    /// `RECEIVE chan`: performs a rendezvous receive and pushes a value of
    /// the channel's element type built from the received octets.
    pub(super) fn op_receive(&mut self) -> OpResult<()> {
        let chan = self.reader.expect_string()?;
        let endpoint = self
            .handle
            .channel(&chan)
            .ok_or_else(|| Fault::UnknownChannel(chan.clone()))?;
        debug!(component = %self.handle.name(), channel = %chan, "RECEIVE");
        let octets = endpoint.receive();
        let value = Value::from_payload(endpoint.elem_tag(), &octets)?;
        debug!(component = %self.handle.name(), channel = %chan, ?value, "received");
        self.operands.push(value);
        Ok(())
    }

    /// Reads one `compVar chan` pair, waits for the component to be
    /// running, and resolves the endpoint.
    fn connect_operand(&mut self) -> OpResult<(Arc<Endpoint>, String)> {
        let component = self.component_operand()?;
        let chan = self.reader.expect_string()?;
        component.await_running();
        let endpoint = component
            .channel(&chan)
            .ok_or_else(|| Fault::UnknownChannel(chan.clone()))?;
        Ok((endpoint, chan))
    }

    fn component_operand(&mut self) -> OpResult<Arc<ComponentHandle>> {
        let var = self.reader.expect_string()?;
        match self.scopes.load(&var)? {
            Value::Component(handle) => Ok(handle),
            other => Err(Fault::TypeMismatch(format!(
                "`{var}` is {}, not a component",
                other.tag()
            ))),
        }
    }
}
