mod handler;
mod model;

pub use handler::{
    create_room, get_room, join_room, leave_room, list_members, list_my_rooms, list_public_rooms,
    update_member,
};
pub use model::PublicRoomsQuery;
