// Database schema definitions
diesel::table! {
    users (id) {
        id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
        email -> Varchar,
        password_hash -> Varchar,
        name -> Varchar,
        role -> Varchar,
    }
}

diesel::table! {
    doctors (id) {
        id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
        user_id -> Int4,
        specialty -> Text,
        description -> Text,
    }
}

diesel::table! {
    patients (id) {
        id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
        user_id -> Int4,
        phone -> Text,
        address -> Text,
        medical_id -> Text,
    }
}

diesel::table! {
    appointments (id) {
        id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
        patient_id -> Int4,
        doctor_id -> Int4,
        date_time -> Timestamptz,
        duration -> Int4,
        status -> Varchar,
        reason -> Text,
        notes -> Text,
        chat_session_id -> Nullable<Int4>,
    }
}

diesel::table! {
    chat_sessions (id) {
        id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
        appointment_id -> Int4,
        messages -> Text,
    }
}

diesel::joinable!(doctors -> users (user_id));
diesel::joinable!(patients -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users, doctors, patients, appointments, chat_sessions,
);
