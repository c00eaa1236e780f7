mod handler;
mod model;

pub use handler::{
    add_reaction, delete_message, edit_message, list_reactions, list_replies, list_room_messages,
    post_message, remove_reaction,
};
pub use model::{EditMessageRequest, ReactionRemoved, ReactionRequest};
