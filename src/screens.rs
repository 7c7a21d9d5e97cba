// src/screens.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileScreens {
    EditProfile,
    EditInstructorProfile,
    ResolveApplications,
    DrivingSchoolProfile,
    LanguagePreferences,
    NotificationPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screens {
    NestedSetup,
    Auth,
    Community,
    FirstStepSetup,
    SecondStepSetup,
    ThirdStepSetup,
    FourthStepSetup,
    FifthStepSetup,
    NewEquation,
    Authenticate,
    Learning,
    AI,
    NestedAI,
    NestedAuthenticate,
    NestedDashboard,
    NestedCommunity,
    NestedProfile,
    NestedLearning,
    Dashboard,
    Profile,
    MyEquations,
    InstructorProfile,
    Instructors,
    DrivingSchoolProfile,
    ReserveRideList,
    Notifications,
    PasswordReset,
    Manage,
    NestedManage,
    GroupLessons,
    GroupStudents,
    NestedAdminDashboard,
    AdminDashboard,
    AdminRides,
    AdminLessons,
    AdminResolvedRides,
    EditRide,
    StudentProfile,
    GroupProfile,
    StudentRides,
    StudentLessons,
    EditProfile,
    EditInstructorProfile,
    LanguagePreferences,
    NotificationPreferences,
    ResolveApplications,
    NestedConversations,
    PopularMarket,
    Chat,
    ChatDetails,
    ChatMembers,
    TempChat,
}

impl From<ProfileScreens> for Screens {
    fn from(screen: ProfileScreens) -> Self {
        match screen {
            ProfileScreens::EditProfile => Screens::EditProfile,
            ProfileScreens::EditInstructorProfile => Screens::EditInstructorProfile,
            ProfileScreens::ResolveApplications => Screens::ResolveApplications,
            ProfileScreens::DrivingSchoolProfile => Screens::DrivingSchoolProfile,
            ProfileScreens::LanguagePreferences => Screens::LanguagePreferences,
            ProfileScreens::NotificationPreferences => Screens::NotificationPreferences,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub screen: Screens,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Route {
    pub fn to(screen: Screens) -> Self {
        Route {
            screen,
            params: None,
        }
    }
}

/// Cross-screen navigation. Fire-and-forget from the caller's side.
pub trait Router: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Forwards navigation requests to whatever drives the screen stack.
#[derive(Clone)]
pub struct ChannelRouter {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelRouter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelRouter { tx }, rx)
    }
}

impl Router for ChannelRouter {
    fn navigate(&self, route: Route) {
        if self.tx.send(route).is_err() {
            log::warn!("Navigation request dropped: router is gone");
        }
    }
}
