//! Binds every public procedure tag to its service operation.

use futures::StreamExt;
use std::sync::Arc;

use crate::application::{ConversationService, FooService, InventoryService};
use crate::domain::foundation::{CoffeeId, ConversationId};

use super::registry::RpcRegistry;
use super::schema::{
    CreateCoffeeRequest, CreateConversationResponse, DeleteCoffeeRequest, ListCoffeesRequest,
    NoError, SendUserMessageRequest, UpdateCoffeeRequest, Void,
};

/// Procedure tags as they appear on the wire.
pub mod tags {
    pub const LIST_COFFEES: &str = "listCoffees";
    pub const CREATE_COFFEE: &str = "createCoffee";
    pub const UPDATE_COFFEE: &str = "updateCoffee";
    pub const DELETE_COFFEE: &str = "deleteCoffee";
    pub const CREATE_CONVERSATION: &str = "createConversation";
    pub const SEND_USER_MESSAGE: &str = "sendUserMessage";
    pub const STREAM_FOO: &str = "streamFoo";
    pub const GET_FOO_RESPONSE: &str = "getFooResponse";
}

/// Services reachable over RPC.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<InventoryService>,
    pub conversations: Arc<ConversationService>,
    pub foo: Arc<FooService>,
}

/// Builds the registry serving every procedure.
pub fn procedures(services: &Services) -> RpcRegistry {
    let registry = RpcRegistry::new();
    let registry = inventory_procedures(registry, &services.inventory);
    let registry = conversation_procedures(registry, &services.conversations);
    demo_procedures(registry, &services.foo)
}

fn inventory_procedures(registry: RpcRegistry, inventory: &Arc<InventoryService>) -> RpcRegistry {
    let list = Arc::clone(inventory);
    let create = Arc::clone(inventory);
    let update = Arc::clone(inventory);
    let delete = Arc::clone(inventory);

    registry
        .unary(tags::LIST_COFFEES, move |request: ListCoffeesRequest| {
            let inventory = Arc::clone(&list);
            async move { Ok::<_, NoError>(inventory.list(&request.into()).await) }
        })
        .unary(tags::CREATE_COFFEE, move |request: CreateCoffeeRequest| {
            let inventory = Arc::clone(&create);
            async move { inventory.create(request.into()).await }
        })
        .unary(tags::UPDATE_COFFEE, move |request: UpdateCoffeeRequest| {
            let inventory = Arc::clone(&update);
            async move {
                let (id, details) = request.into_parts();
                inventory.update(id, details).await
            }
        })
        .unary(tags::DELETE_COFFEE, move |request: DeleteCoffeeRequest| {
            let inventory = Arc::clone(&delete);
            async move { inventory.delete(CoffeeId::new(request.id)).await }
        })
}

fn conversation_procedures(
    registry: RpcRegistry,
    conversations: &Arc<ConversationService>,
) -> RpcRegistry {
    let create = Arc::clone(conversations);
    let send = Arc::clone(conversations);

    registry
        .unary(tags::CREATE_CONVERSATION, move |_: Void| {
            let conversations = Arc::clone(&create);
            async move {
                let id = conversations.create_conversation().await;
                Ok::<_, NoError>(CreateConversationResponse { id })
            }
        })
        .streaming(tags::SEND_USER_MESSAGE, move |request: SendUserMessageRequest| {
            let conversations = Arc::clone(&send);
            async move {
                conversations
                    .send_user_message(ConversationId::new(request.conversation_id), request.message)
                    .await
            }
        })
}

fn demo_procedures(registry: RpcRegistry, foo: &Arc<FooService>) -> RpcRegistry {
    let items = Arc::clone(foo);
    let paragraph = Arc::clone(foo);

    registry
        .streaming(tags::STREAM_FOO, move |_: Void| {
            let stream = items.stream_foo().map(Ok::<_, NoError>);
            async move { Ok::<_, NoError>(stream) }
        })
        .streaming(tags::GET_FOO_RESPONSE, move |_: Void| {
            let stream = paragraph.get_foo_response().map(Ok::<_, NoError>);
            async move { Ok::<_, NoError>(stream) }
        })
}
