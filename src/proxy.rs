use std::{cell::RefCell, rc::Rc};

use dslab_core::{cast, Event, EventHandler, Id, SimulationContext};

use crate::monitoring::Monitoring;
use crate::storage::SharedInfoStorage;
use crate::workload_generators::events::{CollectionRequestEvent, ExecutionRequestEvent};

/// Front door for generated requests: accounts queue growth in monitoring and
/// forwards everything to the installed scheduler.
pub struct Proxy {
    scheduler_id: Id,
    shared_info_storage: Rc<RefCell<SharedInfoStorage>>,
    monitoring: Rc<RefCell<Monitoring>>,

    ctx: SimulationContext,
}

impl Proxy {
    pub fn new(
        ctx: SimulationContext,
        shared_info_storage: Rc<RefCell<SharedInfoStorage>>,
        monitoring: Rc<RefCell<Monitoring>>,
    ) -> Proxy {
        Proxy {
            scheduler_id: Id::MAX,
            shared_info_storage,
            monitoring,
            ctx,
        }
    }

    pub fn get_id(&self) -> Id {
        self.ctx.id()
    }

    pub fn set_scheduler(&mut self, scheduler_id: Id) {
        self.scheduler_id = scheduler_id;
    }
}

impl EventHandler for Proxy {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ExecutionRequestEvent { request } => {
                let user = self
                    .shared_info_storage
                    .borrow()
                    .get_execution_user(request.id.unwrap());
                self.monitoring
                    .borrow_mut()
                    .add_scheduler_queue_size(event.time, 1, user);
                self.ctx.emit_now(ExecutionRequestEvent { request }, self.scheduler_id);
            }
            CollectionRequestEvent { request } => {
                self.shared_info_storage
                    .borrow_mut()
                    .add_collection(request.clone());
                self.ctx.emit_now(CollectionRequestEvent { request }, self.scheduler_id);
            }
        })
    }
}
