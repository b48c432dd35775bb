pub mod request;
pub mod response;

pub use request::{
    Credentials, LoginRequest, RegisterRequest, Registration, UpdateProfileRequest,
};
pub use response::{
    CsrfResponse, LoginResponse, MessageResponse, ProfileResponse, RegisterResponse,
    SuccessResponse, UserDto,
};
