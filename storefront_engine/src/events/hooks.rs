use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DepositApprovedEvent,
    DepositRejectedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderPaidEvent,
    ShortfallEvent,
    WalletAdjustedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing half of every configured hook. Cloned into each API object.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub shortfall_producer: Vec<EventProducer<ShortfallEvent>>,
    pub deposit_approved_producer: Vec<EventProducer<DepositApprovedEvent>>,
    pub deposit_rejected_producer: Vec<EventProducer<DepositRejectedEvent>>,
    pub wallet_adjusted_producer: Vec<EventProducer<WalletAdjustedEvent>>,
}

impl EventProducers {
    pub async fn order_paid(&self, event: OrderPaidEvent) {
        for p in &self.order_paid_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn shortfall(&self, event: ShortfallEvent) {
        for p in &self.shortfall_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn deposit_approved(&self, event: DepositApprovedEvent) {
        for p in &self.deposit_approved_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn deposit_rejected(&self, event: DepositRejectedEvent) {
        for p in &self.deposit_rejected_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn wallet_adjusted(&self, event: WalletAdjustedEvent) {
        for p in &self.wallet_adjusted_producer {
            p.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_shortfall: Option<EventHandler<ShortfallEvent>>,
    pub on_deposit_approved: Option<EventHandler<DepositApprovedEvent>>,
    pub on_deposit_rejected: Option<EventHandler<DepositRejectedEvent>>,
    pub on_wallet_adjusted: Option<EventHandler<WalletAdjustedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new("order paid", buffer_size, f)),
            on_shortfall: hooks.on_shortfall.map(|f| EventHandler::new("shortfall", buffer_size, f)),
            on_deposit_approved: hooks
                .on_deposit_approved
                .map(|f| EventHandler::new("deposit approved", buffer_size, f)),
            on_deposit_rejected: hooks
                .on_deposit_rejected
                .map(|f| EventHandler::new("deposit rejected", buffer_size, f)),
            on_wallet_adjusted: hooks.on_wallet_adjusted.map(|f| EventHandler::new("wallet adjusted", buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_shortfall {
            result.shortfall_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_deposit_approved {
            result.deposit_approved_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_deposit_rejected {
            result.deposit_rejected_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_wallet_adjusted {
            result.wallet_adjusted_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per configured handler. Each one exits once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_shortfall {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_deposit_approved {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_deposit_rejected {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_wallet_adjusted {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_shortfall: Option<Handler<ShortfallEvent>>,
    pub on_deposit_approved: Option<Handler<DepositApprovedEvent>>,
    pub on_deposit_rejected: Option<Handler<DepositRejectedEvent>>,
    pub on_wallet_adjusted: Option<Handler<WalletAdjustedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_shortfall<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ShortfallEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_shortfall = Some(Arc::new(f));
        self
    }

    pub fn on_deposit_approved<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DepositApprovedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_deposit_approved = Some(Arc::new(f));
        self
    }

    pub fn on_deposit_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DepositRejectedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_deposit_rejected = Some(Arc::new(f));
        self
    }

    pub fn on_wallet_adjusted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WalletAdjustedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_wallet_adjusted = Some(Arc::new(f));
        self
    }
}
