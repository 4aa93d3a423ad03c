//! SeaORM entity models
//!
//! Database entities for IdeaBox

mod idea;
mod attachment;
mod category;
mod moderator;

pub use idea::{
    Entity as IdeaEntity,
    Model as Idea,
    ActiveModel as IdeaActiveModel,
    Column as IdeaColumn,
    IdeaStatus,
};

pub use attachment::{
    Entity as AttachmentEntity,
    Model as Attachment,
    ActiveModel as AttachmentActiveModel,
    Column as AttachmentColumn,
};

pub use category::{
    Entity as CategoryEntity,
    Model as Category,
    ActiveModel as CategoryActiveModel,
    Column as CategoryColumn,
    name_key,
};

pub use moderator::{
    Entity as ModeratorEntity,
    Model as Moderator,
    ActiveModel as ModeratorActiveModel,
    Column as ModeratorColumn,
};
